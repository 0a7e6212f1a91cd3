//! Tag vocabulary loaded from the model's `selected_tags.csv`.
//!
//! The table is index-aligned with the model output vector. Each row carries a
//! category code which partitions the vocabulary into rating, general and
//! character tags; rows with any other code stay in the table but are never
//! scored.

use std::io::Read;
use std::path::Path;

use crate::error::LoadError;

/// Emoticon tags whose underscores are part of the glyph.
const KAOMOJI: &[&str] = &[
    "0_0", "(o)_(o)", "+_+", "+_-", "._.", "<o>_<o>", "<|>_<|>", "=_=", ">_<", "3_3", "6_9",
    ">_o", "@_@", "^_^", "o_o", "u_u", "x_x", "|_|", "||_||",
];

/// Semantic role of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Rating,
    General,
    Character,
    /// Any other code (artist, copyright, meta, ...)
    Other,
}

impl Category {
    /// Map a label-file category code.
    pub fn from_code(code: i64) -> Self {
        match code {
            9 => Category::Rating,
            0 => Category::General,
            4 => Category::Character,
            _ => Category::Other,
        }
    }
}

/// Convert a raw tag name into its display form.
pub fn display_name(raw: &str) -> String {
    if KAOMOJI.contains(&raw) {
        raw.to_string()
    } else {
        raw.replace('_', " ")
    }
}

/// Immutable tag vocabulary for one loaded model.
#[derive(Debug, Clone)]
pub struct LabelTable {
    raw_names: Vec<String>,
    tag_names: Vec<String>,
    categories: Vec<Category>,
    rating_indexes: Vec<usize>,
    general_indexes: Vec<usize>,
    character_indexes: Vec<usize>,
}

impl LabelTable {
    /// Build a table from `(raw name, category code)` rows in model output order.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut table = Self {
            raw_names: Vec::new(),
            tag_names: Vec::new(),
            categories: Vec::new(),
            rating_indexes: Vec::new(),
            general_indexes: Vec::new(),
            character_indexes: Vec::new(),
        };

        for (idx, (name, code)) in rows.into_iter().enumerate() {
            let raw: String = name.into();
            let category = Category::from_code(code);
            match category {
                Category::Rating => table.rating_indexes.push(idx),
                Category::General => table.general_indexes.push(idx),
                Category::Character => table.character_indexes.push(idx),
                Category::Other => {}
            }
            table.tag_names.push(display_name(&raw));
            table.raw_names.push(raw);
            table.categories.push(category);
        }

        table
    }

    /// Load the table from a CSV file with `name` and `category` columns.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::LabelsNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|e| LoadError::Labels {
            path: path.to_path_buf(),
            message: format!("Cannot open file: {e}"),
        })?;
        let table = Self::from_reader(file, path)?;
        tracing::info!(
            "Loaded {} labels from {:?} ({} rating, {} general, {} character)",
            table.len(),
            path,
            table.rating_indexes.len(),
            table.general_indexes.len(),
            table.character_indexes.len()
        );
        Ok(table)
    }

    /// Parse CSV from any reader. `path` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self, LoadError> {
        let labels_err = |message: String| LoadError::Labels {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| labels_err(format!("Cannot read header row: {e}")))?
            .clone();
        let column = |wanted: &str| {
            headers
                .iter()
                .position(|h| h == wanted)
                .ok_or_else(|| labels_err(format!("Missing `{wanted}` column")))
        };
        let name_col = column("name")?;
        let category_col = column("category")?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            // +2: one for the header, one for 1-based numbering
            let line = line + 2;
            let record = record.map_err(|e| labels_err(format!("Line {line}: {e}")))?;
            let name = record
                .get(name_col)
                .ok_or_else(|| labels_err(format!("Line {line}: missing name")))?;
            let code: i64 = record
                .get(category_col)
                .ok_or_else(|| labels_err(format!("Line {line}: missing category")))?
                .parse()
                .map_err(|e| labels_err(format!("Line {line}: invalid category code: {e}")))?;
            rows.push((name.to_string(), code));
        }

        if rows.is_empty() {
            return Err(labels_err("Label file has no rows".to_string()));
        }

        Ok(Self::from_rows(rows))
    }

    /// Number of output classes.
    pub fn len(&self) -> usize {
        self.tag_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag_names.is_empty()
    }

    /// Display names, index-aligned with the model output.
    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    /// Names exactly as they appear in the label file.
    pub fn raw_names(&self) -> &[String] {
        &self.raw_names
    }

    /// Category of the tag at `index`, or `None` when out of range.
    pub fn category_of(&self, index: usize) -> Option<Category> {
        self.categories.get(index).copied()
    }

    pub fn rating_indexes(&self) -> &[usize] {
        &self.rating_indexes
    }

    pub fn general_indexes(&self) -> &[usize] {
        &self.general_indexes
    }

    pub fn character_indexes(&self) -> &[usize] {
        &self.character_indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
tag_id,name,category,count
9999999,general,9,807691
9999998,sensitive,9,3269
470575,1girl,0,4339440
212816,solo,0,3544189
87788,blue_eyes,0,805003
1281,^_^,0,20000
1386,hatsune_miku,4,10000
12345,some_artist,1,500
";

    fn sample_table() -> LabelTable {
        LabelTable::from_reader(SAMPLE_CSV.as_bytes(), Path::new("selected_tags.csv")).unwrap()
    }

    #[test]
    fn test_display_name_replaces_underscores() {
        assert_eq!(display_name("blue_eyes"), "blue eyes");
        assert_eq!(display_name("looking_at_viewer"), "looking at viewer");
    }

    #[test]
    fn test_display_name_keeps_kaomoji() {
        assert_eq!(display_name("^_^"), "^_^");
        assert_eq!(display_name("||_||"), "||_||");
        assert_eq!(display_name("o_o"), "o_o");
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(Category::from_code(9), Category::Rating);
        assert_eq!(Category::from_code(0), Category::General);
        assert_eq!(Category::from_code(4), Category::Character);
        assert_eq!(Category::from_code(1), Category::Other);
        assert_eq!(Category::from_code(3), Category::Other);
    }

    #[test]
    fn test_load_partitions_by_category() {
        let table = sample_table();
        assert_eq!(table.len(), 8);
        assert_eq!(table.rating_indexes(), &[0, 1]);
        assert_eq!(table.general_indexes(), &[2, 3, 4, 5]);
        assert_eq!(table.character_indexes(), &[6]);
        assert_eq!(table.category_of(7), Some(Category::Other));
        assert_eq!(table.category_of(8), None);
        assert_eq!(table.tag_names()[4], "blue eyes");
        assert_eq!(table.raw_names()[4], "blue_eyes");
        assert_eq!(table.tag_names()[5], "^_^");
    }

    #[test]
    fn test_category_partitions_are_disjoint() {
        let table = sample_table();
        let mut seen = HashSet::new();
        for idx in table
            .rating_indexes()
            .iter()
            .chain(table.general_indexes())
            .chain(table.character_indexes())
        {
            assert!(seen.insert(*idx), "index {idx} appears in two categories");
        }
        // The artist row is in the table but in no partition
        assert!(!seen.contains(&7));
    }

    #[test]
    fn test_missing_category_column_rejected() {
        let err = LabelTable::from_reader("tag_id,name\n1,solo\n".as_bytes(), Path::new("x.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn test_invalid_category_code_rejected() {
        let err = LabelTable::from_reader(
            "name,category\nsolo,general\n".as_bytes(),
            Path::new("x.csv"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_empty_table_rejected() {
        let err =
            LabelTable::from_reader("name,category\n".as_bytes(), Path::new("x.csv")).unwrap_err();
        assert!(err.to_string().contains("no rows"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LabelTable::load(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::LabelsNotFound(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected_tags.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(SAMPLE_CSV.as_bytes()).unwrap();

        let table = LabelTable::load(&path).unwrap();
        assert_eq!(table.len(), 8);
        assert_eq!(table.tag_names()[6], "hatsune miku");
    }
}
