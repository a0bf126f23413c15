use tabled::{settings::Style, Table, Tabled};
use crate::store::Store;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Two-column metric/value table
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// One store per line in listings
#[derive(Tabled)]
pub struct StoreRow {
    #[tabled(rename = "ID")]
    pub id: i64,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Slug")]
    pub slug: String,
    #[tabled(rename = "Tags")]
    pub tags: String,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Extra")]
    pub extra: String,
}

impl StoreRow {
    pub fn new(store: &Store, extra: impl Into<String>) -> Self {
        Self {
            id: store.id,
            name: store.name.clone(),
            slug: store.slug.clone(),
            tags: store.tags.join(", "),
            address: store.location.address.clone(),
            extra: extra.into(),
        }
    }
}

pub fn store_table(rows: &[StoreRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::store::Location;

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(TableBuilder::new().build().is_empty());
        assert!(store_table(&[]).is_empty());
    }

    #[test]
    fn test_store_table_lists_fields() {
        let store = Store {
            id: 7,
            name: "Cafe Deluxe".into(),
            slug: "cafe-deluxe".into(),
            description: None,
            tags: vec!["wifi".into(), "parking".into()],
            created_at: Utc::now(),
            location: Location::point("1 Main St", 1.0, 2.0),
            photo: None,
            author_id: "alice".into(),
        };

        let table = store_table(&[StoreRow::new(&store, "4.50")]);
        assert!(table.contains("cafe-deluxe"));
        assert!(table.contains("wifi, parking"));
        assert!(table.contains("4.50"));
    }
}
