//! Order records as read from the order store
//!
//! Orders are read-only inputs to a billing run. Numeric fields keep the
//! loosely-typed value they arrived with (a JSON number or numeric text);
//! coercion happens when a rule or calculation reads them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A historical order billed against a customer's services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Externally assigned order/transaction ID
    pub order_id: String,
    /// Owning customer
    pub customer_id: String,
    /// Date the order was placed
    pub order_date: NaiveDate,

    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub ship_to_name: Option<String>,
    #[serde(default)]
    pub ship_to_company: Option<String>,
    #[serde(default)]
    pub ship_to_city: Option<String>,
    #[serde(default)]
    pub ship_to_state: Option<String>,
    #[serde(default)]
    pub ship_to_country: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub weight_lb: Option<Value>,
    #[serde(default)]
    pub line_items: Option<Value>,
    #[serde(default)]
    pub total_item_qty: Option<Value>,
    #[serde(default)]
    pub volume_cuft: Option<Value>,
    #[serde(default)]
    pub packages: Option<Value>,

    /// SKU -> quantity payload: JSON text, a list of `{sku, quantity}`
    /// objects, or a mapping
    #[serde(default)]
    pub sku_quantity: Option<Value>,
}

impl Order {
    /// Create an order with only identity fields set
    pub fn new(
        order_id: impl Into<String>,
        customer_id: impl Into<String>,
        order_date: NaiveDate,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            order_date,
            reference_number: None,
            ship_to_name: None,
            ship_to_company: None,
            ship_to_city: None,
            ship_to_state: None,
            ship_to_country: None,
            carrier: None,
            notes: None,
            weight_lb: None,
            line_items: None,
            total_item_qty: None,
            volume_cuft: None,
            packages: None,
            sku_quantity: None,
        }
    }

    /// Set a text field
    pub fn with_text(mut self, field: FieldName, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            FieldName::ReferenceNumber => self.reference_number = value,
            FieldName::ShipToName => self.ship_to_name = value,
            FieldName::ShipToCompany => self.ship_to_company = value,
            FieldName::ShipToCity => self.ship_to_city = value,
            FieldName::ShipToState => self.ship_to_state = value,
            FieldName::ShipToCountry => self.ship_to_country = value,
            FieldName::Carrier => self.carrier = value,
            FieldName::Notes => self.notes = value,
            _ => {}
        }
        self
    }

    /// Set a numeric field from any JSON-representable value
    pub fn with_number(mut self, field: FieldName, value: impl Into<Value>) -> Self {
        let value = Some(value.into());
        match field {
            FieldName::WeightLb => self.weight_lb = value,
            FieldName::LineItems => self.line_items = value,
            FieldName::TotalItemQty => self.total_item_qty = value,
            FieldName::VolumeCuft => self.volume_cuft = value,
            FieldName::Packages => self.packages = value,
            _ => {}
        }
        self
    }

    /// Set the SKU payload
    pub fn with_skus(mut self, skus: impl Into<Value>) -> Self {
        self.sku_quantity = Some(skus.into());
        self
    }

    /// Raw text field, if `field` is a text field and is set
    pub fn text(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::ReferenceNumber => self.reference_number.as_deref(),
            FieldName::ShipToName => self.ship_to_name.as_deref(),
            FieldName::ShipToCompany => self.ship_to_company.as_deref(),
            FieldName::ShipToCity => self.ship_to_city.as_deref(),
            FieldName::ShipToState => self.ship_to_state.as_deref(),
            FieldName::ShipToCountry => self.ship_to_country.as_deref(),
            FieldName::Carrier => self.carrier.as_deref(),
            FieldName::Notes => self.notes.as_deref(),
            _ => None,
        }
    }

    /// Raw numeric value, if `field` is a numeric field and is set
    pub fn raw_number(&self, field: FieldName) -> Option<&Value> {
        let value = match field {
            FieldName::WeightLb => self.weight_lb.as_ref(),
            FieldName::LineItems => self.line_items.as_ref(),
            FieldName::TotalItemQty => self.total_item_qty.as_ref(),
            FieldName::VolumeCuft => self.volume_cuft.as_ref(),
            FieldName::Packages => self.packages.as_ref(),
            _ => None,
        };
        value.filter(|v| !v.is_null())
    }
}

/// Category of an order field, deciding which comparison semantics apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
    Sku,
}

/// Order fields that rules can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldName {
    WeightLb,
    LineItems,
    TotalItemQty,
    VolumeCuft,
    Packages,
    ReferenceNumber,
    ShipToName,
    ShipToCompany,
    ShipToCity,
    ShipToState,
    ShipToCountry,
    Carrier,
    Notes,
    SkuQuantity,
}

impl FieldName {
    pub const ALL: [FieldName; 14] = [
        FieldName::WeightLb,
        FieldName::LineItems,
        FieldName::TotalItemQty,
        FieldName::VolumeCuft,
        FieldName::Packages,
        FieldName::ReferenceNumber,
        FieldName::ShipToName,
        FieldName::ShipToCompany,
        FieldName::ShipToCity,
        FieldName::ShipToState,
        FieldName::ShipToCountry,
        FieldName::Carrier,
        FieldName::Notes,
        FieldName::SkuQuantity,
    ];

    /// Comparison category of this field
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldName::WeightLb
            | FieldName::LineItems
            | FieldName::TotalItemQty
            | FieldName::VolumeCuft
            | FieldName::Packages => FieldKind::Numeric,
            FieldName::SkuQuantity => FieldKind::Sku,
            _ => FieldKind::Text,
        }
    }

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::WeightLb => "weight_lb",
            FieldName::LineItems => "line_items",
            FieldName::TotalItemQty => "total_item_qty",
            FieldName::VolumeCuft => "volume_cuft",
            FieldName::Packages => "packages",
            FieldName::ReferenceNumber => "reference_number",
            FieldName::ShipToName => "ship_to_name",
            FieldName::ShipToCompany => "ship_to_company",
            FieldName::ShipToCity => "ship_to_city",
            FieldName::ShipToState => "ship_to_state",
            FieldName::ShipToCountry => "ship_to_country",
            FieldName::Carrier => "carrier",
            FieldName::Notes => "notes",
            FieldName::SkuQuantity => "sku_quantity",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a field name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for FieldName {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        FieldName::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

impl TryFrom<String> for FieldName {
    type Error = UnknownField;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldName> for String {
    fn from(field: FieldName) -> Self {
        field.as_str().to_string()
    }
}
