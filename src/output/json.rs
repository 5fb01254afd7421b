//! JSON and YAML renderers
//!
//! Both share one document layout:
//! `{ creatingLibrary: {name, version}, media: [ { "@ref", track: [...] } ] }`.
//! Tracks are serialized as maps whose keys follow the report's field order.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::domain::model::{AppInfo, Report, Stream};
use crate::error::{ProbeXError, ProbeXResult};

/// Serialize reports as pretty-printed JSON
pub fn to_json(reports: &[Report], app: &AppInfo) -> ProbeXResult<String> {
    serde_json::to_string_pretty(&Document { app, reports }).map_err(|e| {
        ProbeXError::Serialization {
            message: format!("JSON serialization failed: {}", e),
        }
    })
}

/// Serialize reports as YAML
pub fn to_yaml(reports: &[Report], app: &AppInfo) -> ProbeXResult<String> {
    serde_yaml::to_string(&Document { app, reports }).map_err(|e| ProbeXError::Serialization {
        message: format!("YAML serialization failed: {}", e),
    })
}

struct Document<'a> {
    app: &'a AppInfo,
    reports: &'a [Report],
}

impl Serialize for Document<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let media: Vec<Media<'_>> = self.reports.iter().map(Media).collect();
        let mut document = serializer.serialize_struct("Document", 2)?;
        document.serialize_field("creatingLibrary", self.app)?;
        document.serialize_field("media", &media)?;
        document.end()
    }
}

struct Media<'a>(&'a Report);

impl Serialize for Media<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let report = self.0;
        let tracks: Vec<Track<'_>> = report
            .streams()
            .iter()
            .map(|stream| Track { report, stream })
            .collect();
        let mut media = serializer.serialize_struct("Media", 2)?;
        media.serialize_field("@ref", report.path())?;
        media.serialize_field("track", &tracks)?;
        media.end()
    }
}

struct Track<'a> {
    report: &'a Report,
    stream: &'a Stream,
}

impl Serialize for Track<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.stream.kind();
        let numbered = self.report.count(kind) > 1;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@type", kind.as_str())?;
        if numbered {
            map.serialize_entry("@typeorder", &self.stream.number().to_string())?;
        }
        for field in self.stream.fields() {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}
