//! Header-template export from an index mapping.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::es::EsClient;

/// Write a header-only workbook for the client's index.
///
/// The file lands at `<dir>/<index>.xlsx` with one header cell per field
/// in the client's field list, in lexicographic order. Uploads later built
/// on the template load with exactly the field set the index knows. An
/// index without any mapped fields has nothing to bootstrap and is an
/// error.
pub fn write_template(client: &EsClient, dir: impl AsRef<Path>) -> FeedResult<PathBuf> {
    let fields = client.field_list();
    if fields.is_empty() {
        return Err(FeedError::SchemaMismatch {
            message: format!(
                "index '{}' has no mapped fields to export",
                client.index()
            ),
        });
    }

    let path = dir.as_ref().join(format!("{}.xlsx", client.index()));
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, field) in fields.iter().enumerate() {
        sheet.write_string(0, col as u16, field)?;
    }
    workbook.save(&path)?;
    debug!(index = %client.index(), path = %path.display(), "template written");
    Ok(path)
}
