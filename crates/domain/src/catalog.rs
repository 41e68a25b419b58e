//! Read-only product search.

use common::Product;
use storage::StorageGateway;

use crate::error::Result;

/// How well a product matched a query. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchRank {
    ExactName,
    NamePrefix,
    NameContains,
    OtherField,
}

fn rank(product: &Product, needle: &str) -> Option<MatchRank> {
    let name = product.name.to_lowercase();
    if name == needle {
        Some(MatchRank::ExactName)
    } else if name.starts_with(needle) {
        Some(MatchRank::NamePrefix)
    } else if name.contains(needle) {
        Some(MatchRank::NameContains)
    } else if product.category.to_lowercase().contains(needle)
        || product.description.to_lowercase().contains(needle)
    {
        Some(MatchRank::OtherField)
    } else {
        None
    }
}

/// Point-in-time catalog search. Never takes locks and never waits on
/// writers.
#[derive(Clone)]
pub struct CatalogIndex<G: StorageGateway> {
    gateway: G,
}

impl<G: StorageGateway> CatalogIndex<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Every product, ordered by name.
    pub async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.gateway.list_products().await?)
    }

    /// Case-insensitive search over name, category and description.
    ///
    /// Name matches come before matches on other fields; ties are broken by
    /// name. A blank query matches nothing.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(MatchRank, Product)> = self
            .gateway
            .list_products()
            .await?
            .into_iter()
            .filter_map(|product| rank(&product, &needle).map(|r| (r, product)))
            .collect();
        hits.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.name.cmp(&b.name)));

        tracing::debug!(hits = hits.len(), "catalog search");
        Ok(hits.into_iter().map(|(_, product)| product).collect())
    }
}
