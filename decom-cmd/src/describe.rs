use std::io::{stdout, Write};

use anyhow::{Context, Result};
use decom::FieldTree;

pub fn describe(tree: &FieldTree) -> Result<()> {
    let mut out = stdout().lock();
    tree.describe(&mut out).context("writing description")?;
    writeln!(out, "\n{} fields", tree.len()).context("writing description")?;
    out.flush().context("writing description")
}
