use std::fs;
use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::ensure;
use anyhow::Context;
use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::plan::sanitize_folder_name;

/// One artist and the albums to fetch for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(
        rename = "id_artista",
        alias = "artist_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub artist_id: Option<String>,

    #[serde(rename = "nome_artista", alias = "artist_name", alias = "artist")]
    pub artist_name: String,

    #[serde(rename = "albuns", alias = "albums", default)]
    pub albums: Vec<Album>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    #[serde(
        rename = "id_album",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(rename = "nome_album", alias = "name")]
    pub name: String,

    /// Source URL handed to the external downloader. Empty strings count as absent.
    #[serde(
        rename = "url_album",
        alias = "url",
        default,
        deserialize_with = "non_empty_string"
    )]
    pub url: Option<String>,
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = de::Deserialize::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl Catalog {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&content)
            .with_context(|| format!("Invalid catalog {}", path.display()))?;
        ensure!(
            !catalog.albums.is_empty(),
            "Catalog {} lists no albums",
            path.display()
        );
        Ok(catalog)
    }

    /// Writes the catalog into `dir` and returns the path of the new file.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> anyhow::Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write catalog {}", path.display()))?;
        Ok(path)
    }

    /// `"Mac Miller"` becomes `mac_miller.json`, `"AC/DC"` becomes `ac_dc.json`.
    pub fn file_name(&self) -> String {
        let lower = sanitize_folder_name(&self.artist_name.to_lowercase());
        let stem = lower.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{}.json", stem)
    }
}

/// Lists the catalog files of the data directory, sorted by name.
pub fn list_catalogs<P: AsRef<Path>>(dir: P) -> anyhow::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    ensure!(
        !files.is_empty(),
        "No JSON files found in {}",
        dir.display()
    );
    Ok(files)
}

/// Prints a numbered menu of `files` and reads the user's choice from `input`.
pub fn choose_catalog<R, W>(
    files: &[PathBuf],
    mut input: R,
    mut output: W,
) -> anyhow::Result<PathBuf>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "Available catalogs:")?;
    for (i, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        writeln!(output, "{}. {}", i + 1, name)?;
    }
    write!(output, "\nEnter the number of the catalog to download: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    match line.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= files.len() => Ok(files[n - 1].clone()),
        _ => bail!("Invalid selection: {:?}", line.trim()),
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parse_catalog_fixture() {
        let catalog = Catalog::load("tests/fixtures/mac_miller.json").unwrap();
        assert_eq!(catalog.artist_name, "Mac Miller");
        assert_eq!(catalog.artist_id.as_deref(), Some("4LLpKhyESsyAXpc4laK94U"));
        assert_eq!(catalog.albums.len(), 4);
        assert_eq!(catalog.albums[0].name, "Circles (Deluxe)");
        assert_eq!(
            catalog.albums[0].url.as_deref(),
            Some("https://open.spotify.com/album/5sY6UIQ32GqwMLAjoBXqJA")
        );
        assert_eq!(catalog.albums[2].url, None);
        assert_eq!(catalog.albums[3].url, None);
    }

    #[test]
    fn parse_english_keys() {
        let catalog: Catalog = serde_json::from_str(
            r#"{"artist_name": "A", "albums": [{"name": "B", "url": "u"}, {"name": "C"}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.artist_name, "A");
        assert_eq!(catalog.albums[0].url.as_deref(), Some("u"));
        assert_eq!(catalog.albums[1].url, None);
    }

    #[test]
    fn load_rejects_empty_and_invalid() {
        let dir = tempdir().unwrap();

        let empty = dir.path().join("empty.json");
        fs::write(&empty, r#"{"nome_artista": "A", "albuns": []}"#).unwrap();
        assert!(Catalog::load(&empty).is_err());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(Catalog::load(&broken).is_err());

        assert!(Catalog::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn save_uses_artist_file_name() {
        let dir = tempdir().unwrap();
        let catalog = Catalog {
            artist_id: None,
            artist_name: "Mac  Miller Ção".to_string(),
            albums: vec![Album {
                id: Some("x".to_string()),
                name: "Swimming".to_string(),
                url: Some("https://open.spotify.com/album/x".to_string()),
            }],
        };

        let path = catalog.save(dir.path().join("data")).unwrap();
        assert_eq!(path.file_name().unwrap(), "mac_miller_ção.json");

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"nome_artista\": \"Mac  Miller Ção\""));
        assert!(!content.contains("id_artista"));
        assert_eq!(Catalog::load(&path).unwrap(), catalog);
    }

    #[test]
    fn save_with_path_illegal_artist_name() {
        let dir = tempdir().unwrap();
        let catalog = Catalog {
            artist_id: None,
            artist_name: "AC/DC: Live?".to_string(),
            albums: vec![Album {
                id: None,
                name: "Back in Black".to_string(),
                url: Some("https://open.spotify.com/album/y".to_string()),
            }],
        };
        assert_eq!(catalog.file_name(), "ac_dc__live_.json");

        let path = catalog.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("ac_dc__live_.json"));
        assert_eq!(Catalog::load(&path).unwrap().artist_name, "AC/DC: Live?");
    }

    #[test]
    fn list_only_json_files() {
        let dir = tempdir().unwrap();
        assert!(list_catalogs(dir.path()).is_err());

        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = list_catalogs(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn choose_by_number() {
        let files = vec![PathBuf::from("data/a.json"), PathBuf::from("data/b.json")];
        let mut out = Vec::new();

        let chosen = choose_catalog(&files, Cursor::new("2\n"), &mut out).unwrap();
        assert_eq!(chosen, PathBuf::from("data/b.json"));

        let menu = String::from_utf8(out).unwrap();
        assert!(menu.contains("1. a.json"));
        assert!(menu.contains("2. b.json"));
    }

    #[test]
    fn choose_rejects_invalid_input() {
        let files = vec![PathBuf::from("a.json")];
        for input in ["0\n", "2\n", "one\n", "\n", ""] {
            assert!(choose_catalog(&files, Cursor::new(input), Vec::<u8>::new()).is_err());
        }
    }
}
