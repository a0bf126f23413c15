pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, muted, section, success, summary_row};
pub use progress::ImportProgress;
pub use table::{stats_table, store_table, StoreRow, TableBuilder};
pub use theme::{theme, Theme};
