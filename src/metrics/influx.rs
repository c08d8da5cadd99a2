use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::cli::config::MetricsSettings;
use crate::error::{Error, Result};

/// One timestamped record for the time-series store.
#[derive(Debug, Clone)]
pub struct Point {
    pub measurement: String,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl Point {
    /// Render the point in InfluxDB line protocol.
    pub fn to_line(&self) -> String {
        let mut line = escape_name(&self.measurement);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_name(key));
            line.push('=');
            line.push_str(&escape_name(value));
        }

        line.push(' ');
        let fields = self
            .fields
            .iter()
            .map(|(key, value)| match value {
                FieldValue::Integer(v) => format!("{}={}i", escape_name(key), v),
                FieldValue::Text(v) => {
                    format!("{}=\"{}\"", escape_name(key), v.replace('\\', "\\\\").replace('"', "\\\""))
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        line.push_str(&fields);

        line.push(' ');
        line.push_str(
            &self
                .timestamp
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_string(),
        );

        line
    }
}

// Measurement names, tag keys/values and field keys share the same
// escaping rules in line protocol.
fn escape_name(name: &str) -> String {
    name.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// HTTP writer for an InfluxDB-compatible time-series sink.
///
/// A negative acknowledgment from the sink is surfaced as an error:
/// silent metric loss is indistinguishable from system health.
pub struct InfluxSink {
    client: Client,
    write_url: String,
}

impl InfluxSink {
    pub fn new(settings: &MetricsSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let write_url = format!(
            "{}/write?db={}",
            settings.influx_url.trim_end_matches('/'),
            settings.database
        );

        Ok(Self { client, write_url })
    }

    pub async fn write_point(&self, point: &Point) -> Result<()> {
        let line = point.to_line();

        let response = self
            .client
            .post(&self.write_url)
            .body(line)
            .send()
            .await
            .map_err(|e| Error::SinkWrite(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::SinkWrite(format!("{status}: {detail}")));
        }

        debug!(measurement = %point.measurement, "wrote point");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_point() -> Point {
        Point {
            measurement: "worker_stats".to_string(),
            timestamp: Utc.with_ymd_and_hms(2021, 4, 15, 16, 29, 0).unwrap(),
            tags: vec![("worker_name".to_string(), "spider one".to_string())],
            fields: vec![
                ("requested".to_string(), FieldValue::Integer(25)),
                (
                    "reason".to_string(),
                    FieldValue::Text("say \"bye\"".to_string()),
                ),
            ],
        }
    }

    fn settings(url: &str) -> MetricsSettings {
        MetricsSettings {
            influx_url: url.to_string(),
            database: "spider".to_string(),
            interval: 60,
        }
    }

    #[test]
    fn line_protocol_escapes_tags_and_strings() {
        let line = sample_point().to_line();
        assert!(line.starts_with("worker_stats,worker_name=spider\\ one "));
        assert!(line.contains("requested=25i"));
        assert!(line.contains("reason=\"say \\\"bye\\\"\""));
        assert!(line.ends_with("1618504140000000000"));
    }

    #[tokio::test]
    async fn write_point_posts_line_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "spider"))
            .and(body_string_contains("requested=25i"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = InfluxSink::new(&settings(&server.uri())).unwrap();
        sink.write_point(&sample_point()).await.unwrap();
    }

    #[tokio::test]
    async fn negative_acknowledgment_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let sink = InfluxSink::new(&settings(&server.uri())).unwrap();
        let err = sink.write_point(&sample_point()).await.unwrap_err();
        assert!(matches!(err, Error::SinkWrite(_)));
    }
}
