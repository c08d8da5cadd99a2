use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, ReplaceOptions};
use mongodb::{Client, Database};
use tracing::debug;

use crate::cli::config::DocumentSettings;
use crate::error::Result;
use crate::worker::task::DetailRecord;

/// Destination for parsed detail records: one keyed write per record.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn upsert(&self, table: &str, url: &str, record: &DetailRecord) -> Result<()>;
}

/// MongoDB-backed document store. Records are keyed by the content hash
/// of the page URL so a re-crawl replaces the old version instead of
/// duplicating it.
pub struct DocumentStore {
    database: Database,
}

impl DocumentStore {
    pub async fn connect(settings: &DocumentSettings) -> Result<Self> {
        let options = ClientOptions::parse(&settings.mongo_uri).await?;
        let client = Client::with_options(options)?;
        let database = client.database(&settings.database);

        debug!(database = %settings.database, "connected to document store");

        Ok(Self { database })
    }

    fn url_id(url: &str) -> String {
        format!("{:x}", md5::compute(url.as_bytes()))
    }
}

#[async_trait]
impl DocumentSink for DocumentStore {
    async fn upsert(&self, table: &str, url: &str, record: &DetailRecord) -> Result<()> {
        let id = Self::url_id(url);

        let mut document = mongodb::bson::to_document(record)?;
        document.insert("_id", id.clone());

        let collection = self.database.collection::<mongodb::bson::Document>(table);
        collection
            .replace_one(
                doc! { "_id": &id },
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;

        debug!(table = %table, url = %url, "stored detail record");

        Ok(())
    }
}
