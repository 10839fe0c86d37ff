//! Notice record reader.
//!
//! A record is UTF-8 text with an optional YAML front-matter block separated
//! from the body by a line holding only `---`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Notice, NoticeType, ServiceState};

/// Extension of notice records inside the notice directory.
pub const NOTICE_EXTENSION: &str = "txt";

const DELIMITER: &str = "---";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_MARKUP: &str = "markdown";

/// Local date-time layouts accepted besides RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Front-matter keys this service understands; everything else lands in `extra`.
#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<NoticeType>,
    #[serde(default)]
    markup_language: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    starts_at: Option<String>,
    #[serde(default)]
    expire_at: Option<String>,
    #[serde(default)]
    eta: Option<String>,
    #[serde(default, deserialize_with = "yaml11_bool")]
    active: Option<bool>,
    #[serde(default)]
    force_state: Option<String>,
    #[serde(default)]
    affects: Option<Vec<String>>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Accepts the YAML 1.1 boolean words (`yes`, `no`, `on`, `off`, `y`, `n`) in
/// any case, alongside plain booleans.
fn yaml11_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Word(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(value)) => Ok(Some(value)),
        Some(Raw::Word(word)) => match word.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => Ok(Some(true)),
            "false" | "no" | "n" | "off" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {:?}",
                word
            ))),
        },
    }
}

/// Split raw record content into `(front_matter, body)`.
///
/// A record starting with a delimiter line takes everything up to the next
/// delimiter as front matter. Otherwise the first delimiter line ends the
/// front matter. Without any delimiter the whole record is body. Later
/// delimiter lines belong to the body.
pub fn split_front_matter(content: &str) -> (String, String) {
    let lines: Vec<&str> = content.lines().collect();
    let delimiters: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim() == DELIMITER)
        .map(|(index, _)| index)
        .collect();

    let (front, body) = match delimiters.as_slice() {
        [0, second, ..] => (&lines[1..*second], &lines[*second + 1..]),
        [first, ..] => (&lines[..*first], &lines[*first + 1..]),
        [] => (&lines[..0], &lines[..]),
    };

    (front.join("\n"), body.join("\n").trim().to_string())
}

/// Derive the notice id from its file name.
pub fn notice_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
}

/// Parse one record. `id` and `updated_at` come from the record's source.
pub fn parse_notice(id: &str, content: &str, updated_at: DateTime<Utc>) -> Result<Notice, AppError> {
    let (front, body) = split_front_matter(content);

    let mut front: FrontMatter = if front.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(&front).map_err(|e| AppError::parse(id, e))?
    };
    // Derived from the record's source; author-supplied values are dropped.
    front.extra.remove("id");
    front.extra.remove("updated_at");

    let timezone = front
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let tz: Tz = timezone
        .parse()
        .map_err(|_| AppError::parse(id, format!("unknown timezone {:?}", timezone)))?;

    let timestamp = |key: &str, raw: Option<String>| -> Result<_, AppError> {
        raw.map(|raw| parse_timestamp(&raw, tz))
            .transpose()
            .map_err(|message| AppError::parse(id, format!("{}: {}", key, message)))
    };
    let created_at = timestamp("created_at", front.created_at)?;
    let starts_at = timestamp("starts_at", front.starts_at)?;
    let expire_at = timestamp("expire_at", front.expire_at)?;
    let eta = timestamp("eta", front.eta)?;

    let force_state = front
        .force_state
        .map(|raw| raw.parse::<ServiceState>())
        .transpose()
        .map_err(|message| AppError::parse(id, format!("force_state: {}", message)))?;

    Ok(Notice {
        id: id.to_string(),
        kind: front.kind.unwrap_or_default(),
        title: front.title.unwrap_or_default(),
        markup_language: front
            .markup_language
            .unwrap_or_else(|| DEFAULT_MARKUP.to_string()),
        timezone,
        body,
        created_at,
        starts_at,
        expire_at,
        eta,
        active: front.active.unwrap_or(false),
        force_state,
        affects: front
            .affects
            .unwrap_or_default()
            .into_iter()
            .collect::<BTreeSet<_>>(),
        updated_at,
        extra: front.extra,
    })
}

/// Parse a timestamp in the notice's timezone.
///
/// Values carrying an explicit offset keep their instant and are shifted into
/// `tz`; local values are interpreted in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<DateTime<FixedOffset>, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&tz).fixed_offset());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.with_timezone(&tz).fixed_offset());
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("unrecognised timestamp {:?}", raw))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("{} does not exist in {}", naive, tz.name()))
}

/// Read and parse one notice file.
pub async fn read_notice(path: &Path) -> Result<Notice, AppError> {
    let record = path.display().to_string();
    let id = notice_id(path)
        .ok_or_else(|| AppError::parse(&record, "file name is not valid UTF-8"))?;

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io(&record, e))?;
    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map_err(|e| AppError::io(&record, e))?;

    parse_notice(&id, &content, DateTime::<Utc>::from(modified))
}

/// List notice files in `dir`, in path order.
pub async fn list_notice_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let record = dir.display().to_string();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AppError::io(&record, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::io(&record, e))?
    {
        let path = entry.path();
        let is_notice = path
            .extension()
            .is_some_and(|ext| ext == NOTICE_EXTENSION);
        if is_notice && entry.file_type().await.is_ok_and(|t| t.is_file()) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    #[test]
    fn test_split_leading_delimiter() {
        let (front, body) = split_front_matter("---\na: 1\n---\nbody");
        assert_eq!(front, "a: 1");
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_single_delimiter() {
        let (front, body) = split_front_matter("a: 1\n---\nbody");
        assert_eq!(front, "a: 1");
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_without_delimiter() {
        let (front, body) = split_front_matter("just body");
        assert_eq!(front, "");
        assert_eq!(body, "just body");
    }

    #[test]
    fn test_split_keeps_rules_in_body() {
        let (front, body) = split_front_matter("---\ntitle: x\n---\nfirst\n---\nsecond\n");
        assert_eq!(front, "title: x");
        assert_eq!(body, "first\n---\nsecond");
    }

    #[test]
    fn test_front_matter_values() {
        let (front, _) = split_front_matter("---\na: 1\n---\nbody");
        let parsed: serde_yaml::Value = serde_yaml::from_str(&front).unwrap();
        assert_eq!(parsed["a"], serde_yaml::Value::from(1));
    }

    #[test]
    fn test_parse_full_notice() {
        let content = "---\n\
title: Mail outage\n\
type: outage\n\
timezone: America/Vancouver\n\
created_at: 2024-01-15 09:30:00\n\
starts_at: 2024-01-15T17:00:00Z\n\
active: true\n\
force_state: down\n\
affects:\n  - mail\n  - webmail\n\
reporter: ops\n\
---\n\
We are investigating.\n";

        let notice = parse_notice("mail-outage", content, epoch()).unwrap();
        assert_eq!(notice.id, "mail-outage");
        assert_eq!(notice.kind, NoticeType::Outage);
        assert_eq!(notice.title, "Mail outage");
        assert_eq!(notice.markup_language, "markdown");
        assert_eq!(notice.body, "We are investigating.");
        assert!(notice.active);
        assert_eq!(notice.force_state, Some(ServiceState::Down));
        assert!(notice.affects_service("mail"));
        assert!(notice.affects_service("webmail"));
        assert_eq!(notice.extra["reporter"], serde_yaml::Value::from("ops"));

        // 09:30 PST is 17:30 UTC.
        let created = notice.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2024-01-15T09:30:00-08:00");
        assert_eq!(created.with_timezone(&Utc).to_rfc3339(), "2024-01-15T17:30:00+00:00");

        // An explicit offset keeps its instant, shown in the notice timezone.
        let starts = notice.starts_at.unwrap();
        assert_eq!(starts.to_rfc3339(), "2024-01-15T09:00:00-08:00");
    }

    #[test]
    fn test_filename_id_wins() {
        let notice = parse_notice(
            "y",
            "id: x\nupdated_at: 2020-01-01\nowner: ops\n---\nbody",
            epoch(),
        )
        .unwrap();
        assert_eq!(notice.id, "y");
        assert_eq!(notice.updated_at, epoch());
        assert!(!notice.extra.contains_key("id"));
        assert!(!notice.extra.contains_key("updated_at"));
        assert_eq!(notice.extra["owner"], serde_yaml::Value::from("ops"));
    }

    #[test]
    fn test_yaml11_boolean_words_for_active() {
        for (raw, expected) in [
            ("yes", true),
            ("On", true),
            ("y", true),
            ("true", true),
            ("no", false),
            ("off", false),
            ("FALSE", false),
        ] {
            let content = format!("active: {}\n---\nbody", raw);
            let notice = parse_notice("n", &content, epoch()).unwrap();
            assert_eq!(notice.active, expected, "active: {}", raw);
        }

        let notice = parse_notice("n", "active:\n---\nbody", epoch()).unwrap();
        assert!(!notice.active);
        assert!(parse_notice("n", "active: maybe\n---\nbody", epoch()).is_err());
    }

    #[test]
    fn test_defaults() {
        let notice = parse_notice("plain", "just body", epoch()).unwrap();
        assert_eq!(notice.timezone, "UTC");
        assert_eq!(notice.kind, NoticeType::Other);
        assert!(!notice.active);
        assert!(notice.affects.is_empty());
        assert!(notice.created_at.is_none());
        assert_eq!(notice.updated_at, epoch());
    }

    #[test]
    fn test_null_affects_is_empty() {
        let notice = parse_notice("n", "affects:\n---\nbody", epoch()).unwrap();
        assert!(notice.affects.is_empty());
    }

    #[test]
    fn test_malformed_front_matter() {
        let err = parse_notice("broken", "---\ntitle: [unclosed\n---\nbody", epoch()).unwrap_err();
        assert!(matches!(err, AppError::Parse { ref record, .. } if record == "broken"));
    }

    #[test]
    fn test_unknown_timezone_and_state() {
        assert!(parse_notice("tz", "timezone: Mars/Olympus\n---\nx", epoch()).is_err());
        assert!(parse_notice("fs", "force_state: sideways\n---\nx", epoch()).is_err());
        assert!(parse_notice("ts", "created_at: yesterday\n---\nx", epoch()).is_err());
    }

    #[test]
    fn test_date_only_timestamp() {
        let dt = parse_timestamp("2024-03-01", Tz::UTC).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_nonexistent_local_time() {
        // Clocks jump from 02:00 to 03:00 on this date in Vancouver.
        let tz: Tz = "America/Vancouver".parse().unwrap();
        assert!(parse_timestamp("2024-03-10 02:30", tz).is_err());
    }

    #[tokio::test]
    async fn test_read_notice_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db-maintenance.txt");
        std::fs::write(&path, "title: DB\nactive: true\n---\nBody").unwrap();

        let notice = read_notice(&path).await.unwrap();
        assert_eq!(notice.id, "db-maintenance");
        assert_eq!(notice.title, "DB");
        assert!(notice.updated_at > epoch());
    }

    #[tokio::test]
    async fn test_read_missing_notice() {
        let dir = TempDir::new().unwrap();
        let err = read_notice(&dir.path().join("gone.txt")).await.unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }

    #[tokio::test]
    async fn test_list_only_txt_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::write(dir.path().join("notes.md"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let files = list_notice_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
