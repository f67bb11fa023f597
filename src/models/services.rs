use serde::{Deserialize, Serialize};

/// Itemized services configuration fixed at booking time. Closed shape so the
/// pricing invariant (line items sum to the booking total) stays checkable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_service: LineItem,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub add_ons: Vec<LineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub price_cents: i64,
}

impl ServiceConfig {
    pub fn total_cents(&self) -> i64 {
        self.base_service.price_cents
            + self.items.iter().map(|i| i.price_cents).sum::<i64>()
            + self.add_ons.iter().map(|a| a.price_cents).sum::<i64>()
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sums_all_line_items() {
        let config = ServiceConfig {
            base_service: LineItem {
                label: "Wash & Fold".to_string(),
                price_cents: 2500,
            },
            items: vec![
                LineItem {
                    label: "Bedding bag".to_string(),
                    price_cents: 1200,
                },
                LineItem {
                    label: "Extra bag".to_string(),
                    price_cents: 800,
                },
            ],
            add_ons: vec![LineItem {
                label: "Same-day".to_string(),
                price_cents: 500,
            }],
        };
        assert_eq!(config.total_cents(), 5000);
    }

    #[test]
    fn test_missing_lists_default_empty() {
        let config =
            ServiceConfig::from_json(r#"{"base_service":{"label":"Wash","price_cents":2000}}"#)
                .unwrap();
        assert!(config.items.is_empty());
        assert!(config.add_ons.is_empty());
        assert_eq!(config.total_cents(), 2000);
    }
}
