//! DASH manifest reference verification.
//!
//! After the packager exits successfully the manifest is scanned for the files
//! it points at (`initialization`, `media` and `sourceURL` attributes). Segment
//! templates are expanded for every representation in the same adaptation set
//! and for every segment the template addresses:
//!
//! - with a `SegmentTimeline`, one segment per `<S>` entry plus its `r`
//!   repeats (a negative `r` runs to the next entry or the end of the
//!   presentation);
//! - otherwise `ceil(mediaPresentationDuration / duration)` segments from
//!   `startNumber`, or just the first one when either value is absent.
//!
//! `$Number$`, `$Time$`, `$RepresentationID$` and `$Bandwidth$` are substituted,
//! with `%0Nd` widths. Remote URLs and unknown identifiers are skipped.

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::sync::OnceLock;

use crate::{Error, Result};

/// Upper bound on segments enumerated per template.
const MAX_SEGMENTS: u64 = 100_000;

/// Result of checking one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestCheck {
    /// Relative paths that were resolved and checked.
    pub checked: Vec<String>,
    /// References that do not exist or point outside the manifest directory.
    pub missing: Vec<String>,
}

impl ManifestCheck {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(?:initialization|media|sourceURL)\s*=\s*"([^"]*)""#)
            .expect("static regex")
    })
}

fn representation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<Representation\b([^>]*)>").expect("static regex"))
}

fn segment_template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<SegmentTemplate\b([^>]*)>").expect("static regex"))
}

fn timeline_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<S\b([^>]*)>").expect("static regex"))
}

fn attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*"([^"]*)""#).expect("static regex")
    })
}

fn presentation_duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bmediaPresentationDuration\s*=\s*"([^"]*)""#).expect("static regex")
    })
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:(Number|Time|RepresentationID|Bandwidth)(?:%0(\d+)d)?)?\$")
            .expect("static regex")
    })
}

#[derive(Debug, Clone, Copy)]
struct Representation<'a> {
    id: &'a str,
    bandwidth: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    number: u64,
    time: u64,
}

/// Read and verify the manifest at `path`.
pub fn verify_manifest(path: &Path) -> Result<ManifestCheck> {
    let xml = std::fs::read_to_string(path)?;
    let base = path
        .parent()
        .ok_or_else(|| Error::InvalidInput(format!("manifest has no parent: {:?}", path)))?;
    Ok(check_references(&xml, base))
}

/// Verify that every local reference in `xml` exists below `base`.
pub fn check_references(xml: &str, base: &Path) -> ManifestCheck {
    let mut checked = BTreeSet::new();
    let mut missing = BTreeSet::new();

    let presentation = presentation_duration_re()
        .captures(xml)
        .and_then(|c| parse_iso_duration(&c[1]));

    for scope in adaptation_scopes(xml) {
        let reps = representations(scope);
        let segments = segments(scope, presentation);

        for cap in reference_re().captures_iter(scope) {
            for rel in expand_reference(&cap[1], &reps, &segments) {
                if is_local_relative(&rel) && base.join(&rel).is_file() {
                    checked.insert(rel);
                } else {
                    missing.insert(rel);
                }
            }
        }
    }

    ManifestCheck {
        checked: checked.into_iter().collect(),
        missing: missing.into_iter().collect(),
    }
}

/// Split the manifest into one chunk per adaptation set.
///
/// Text before the first adaptation set is its own chunk, so period-level
/// references still get checked.
fn adaptation_scopes(xml: &str) -> Vec<&str> {
    let starts: Vec<usize> = xml.match_indices("<AdaptationSet").map(|(i, _)| i).collect();
    if starts.is_empty() {
        return vec![xml];
    }

    let mut scopes = Vec::with_capacity(starts.len() + 1);
    scopes.push(&xml[..starts[0]]);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(xml.len());
        scopes.push(&xml[start..end]);
    }
    scopes
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attribute_re()
        .captures_iter(attrs)
        .find(|c| &c[1] == name)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

fn numeric(attrs: &str, name: &str) -> Option<u64> {
    attribute(attrs, name).and_then(|v| v.trim().parse().ok())
}

fn representations(scope: &str) -> Vec<Representation<'_>> {
    representation_re()
        .captures_iter(scope)
        .filter_map(|c| {
            let attrs = c.get(1)?.as_str();
            Some(Representation {
                id: attribute(attrs, "id")?,
                bandwidth: numeric(attrs, "bandwidth"),
            })
        })
        .collect()
}

/// Every segment the adaptation set's template addresses.
fn segments(scope: &str, presentation: Option<f64>) -> Vec<Segment> {
    let first = Segment { number: 1, time: 0 };
    let Some(template) = segment_template_re().captures(scope) else {
        return vec![first];
    };
    let attrs = template.get(1).map_or("", |m| m.as_str());
    let start = numeric(attrs, "startNumber").unwrap_or(1);
    let timescale = numeric(attrs, "timescale").filter(|t| *t > 0).unwrap_or(1);

    let entries: Vec<&str> = timeline_entry_re()
        .captures_iter(scope)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if !entries.is_empty() {
        let end = presentation.map(|secs| (secs * timescale as f64).round() as u64);
        return timeline_segments(&entries, start, end);
    }

    match (numeric(attrs, "duration").filter(|d| *d > 0), presentation) {
        (Some(duration), Some(secs)) => {
            let count = ceil_count(secs * timescale as f64 / duration as f64);
            (0..count)
                .map(|i| Segment {
                    number: start + i,
                    time: i * duration,
                })
                .collect()
        }
        _ => vec![Segment {
            number: start,
            time: 0,
        }],
    }
}

fn timeline_segments(entries: &[&str], start: u64, end: Option<u64>) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut next_time = 0u64;

    for (i, attrs) in entries.iter().enumerate() {
        let Some(duration) = numeric(attrs, "d").filter(|d| *d > 0) else {
            continue;
        };
        let mut time = numeric(attrs, "t").unwrap_or(next_time);
        let repeat: i64 = attribute(attrs, "r")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);

        let count = if repeat < 0 {
            let until = entries
                .get(i + 1)
                .and_then(|next| numeric(next, "t"))
                .or(end);
            until
                .map(|u| u.saturating_sub(time).div_ceil(duration))
                .unwrap_or(1)
                .max(1)
        } else {
            repeat as u64 + 1
        };

        for _ in 0..count {
            if out.len() as u64 >= MAX_SEGMENTS {
                return out;
            }
            out.push(Segment {
                number: start + out.len() as u64,
                time,
            });
            time += duration;
        }
        next_time = time;
    }
    out
}

fn ceil_count(value: f64) -> u64 {
    let n = (value - 1e-9).ceil();
    if n.is_finite() && n >= 1.0 {
        (n as u64).min(MAX_SEGMENTS)
    } else {
        1
    }
}

/// Seconds in an ISO 8601 duration such as `PT1M59.5S`.
///
/// Years and months have no fixed length and are rejected.
fn parse_iso_duration(value: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut number = String::new();
    let mut in_time = false;

    for c in value.trim().strip_prefix('P')?.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' | '.' => number.push(c),
            unit => {
                let amount: f64 = number.parse().ok()?;
                number.clear();
                total += amount
                    * match (unit, in_time) {
                        ('W', false) => 604_800.0,
                        ('D', false) => 86_400.0,
                        ('H', true) => 3_600.0,
                        ('M', true) => 60.0,
                        ('S', true) => 1.0,
                        _ => return None,
                    };
            }
        }
    }
    number.is_empty().then_some(total)
}

/// Turn one attribute value into the concrete relative paths to check.
fn expand_reference(
    raw: &str,
    reps: &[Representation<'_>],
    segments: &[Segment],
) -> Vec<String> {
    let value = raw.split(['?', '#']).next().unwrap_or_default().trim();
    if value.is_empty() || value.contains("://") {
        return Vec::new();
    }
    // Anything left after removing known identifiers cannot be resolved offline.
    if identifier_re().replace_all(value, "").contains('$') {
        return Vec::new();
    }

    let rep_choices: Vec<Option<&Representation<'_>>> =
        if value.contains("$RepresentationID") || value.contains("$Bandwidth") {
            reps.iter().map(Some).collect()
        } else {
            vec![None]
        };
    let segment_choices: Vec<Option<Segment>> =
        if value.contains("$Number") || value.contains("$Time") {
            segments.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

    let mut out = Vec::with_capacity(rep_choices.len() * segment_choices.len());
    for rep in &rep_choices {
        for segment in &segment_choices {
            if let Some(path) = substitute(value, *rep, *segment) {
                out.push(path);
            }
        }
    }
    out
}

fn substitute(
    template: &str,
    rep: Option<&Representation<'_>>,
    segment: Option<Segment>,
) -> Option<String> {
    let mut resolved = true;
    let out = identifier_re().replace_all(template, |caps: &Captures<'_>| {
        let Some(name) = caps.get(1) else {
            return "$".to_string();
        };
        let number = match name.as_str() {
            "RepresentationID" => {
                return match rep {
                    Some(r) => r.id.to_string(),
                    None => {
                        resolved = false;
                        String::new()
                    }
                };
            }
            "Number" => segment.map(|s| s.number),
            "Time" => segment.map(|s| s.time),
            _ => rep.and_then(|r| r.bandwidth),
        };
        match number {
            Some(n) => {
                let width: usize = caps
                    .get(2)
                    .and_then(|w| w.as_str().parse().ok())
                    .unwrap_or(0);
                format!("{:0width$}", n, width = width)
            }
            None => {
                resolved = false;
                String::new()
            }
        }
    });
    let out = out.into_owned();
    resolved.then_some(out)
}

fn is_local_relative(rel: &str) -> bool {
    let path = Path::new(rel);
    !rel.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENTO4_STYLE: &str = r#"<?xml version="1.0" ?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet mimeType="audio/mp4" segmentAlignment="true">
      <SegmentTemplate timescale="1000" duration="4000" initialization="$RepresentationID$/init.mp4" media="$RepresentationID$/seg-$Number$.m4s" startNumber="1"/>
      <Representation id="audio/en/mp4a.40.2" codecs="mp4a.40.2" bandwidth="128000"/>
    </AdaptationSet>
    <AdaptationSet mimeType="video/mp4" segmentAlignment="true">
      <SegmentTemplate timescale="1000" duration="4000" initialization="$RepresentationID$/init.mp4" media="$RepresentationID$/seg-$Number$.m4s" startNumber="1"/>
      <Representation id="video/avc1/1" codecs="avc1.42c00d" width="160" height="90" bandwidth="250000"/>
      <Representation id="video/avc1/2" codecs="avc1.42c015" width="320" height="180" bandwidth="500000"/>
    </AdaptationSet>
  </Period>
</MPD>
"#;

    fn write(base: &Path, rel: &str) {
        let path = base.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn complete_manifest_passes() {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            "audio/en/mp4a.40.2/init.mp4",
            "audio/en/mp4a.40.2/seg-1.m4s",
            "video/avc1/1/init.mp4",
            "video/avc1/1/seg-1.m4s",
            "video/avc1/2/init.mp4",
            "video/avc1/2/seg-1.m4s",
        ] {
            write(dir.path(), rel);
        }
        let check = check_references(BENTO4_STYLE, dir.path());
        assert!(check.is_complete(), "missing: {:?}", check.missing);
        assert_eq!(check.checked.len(), 6);
    }

    #[test]
    fn missing_segment_reported() {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            "audio/en/mp4a.40.2/init.mp4",
            "audio/en/mp4a.40.2/seg-1.m4s",
            "video/avc1/1/init.mp4",
            "video/avc1/1/seg-1.m4s",
            "video/avc1/2/init.mp4",
        ] {
            write(dir.path(), rel);
        }
        let check = check_references(BENTO4_STYLE, dir.path());
        assert_eq!(check.missing, vec!["video/avc1/2/seg-1.m4s".to_string()]);
    }

    #[test]
    fn explicit_segment_list_and_escape() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "v/init.mp4");
        let xml = r#"<MPD><Period><AdaptationSet>
            <Representation id="v">
              <SegmentList>
                <Initialization sourceURL="v/init.mp4"/>
                <SegmentURL media="../../etc/passwd"/>
                <SegmentURL media="http://cdn.example/seg.m4s"/>
              </SegmentList>
            </Representation>
          </AdaptationSet></Period></MPD>"#;
        let check = check_references(xml, dir.path());
        assert_eq!(check.checked, vec!["v/init.mp4".to_string()]);
        assert_eq!(check.missing, vec!["../../etc/passwd".to_string()]);
    }

    #[test]
    fn padded_number_and_start_number() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "r1/seg-00005.m4s");
        let xml = r#"<MPD><AdaptationSet>
            <SegmentTemplate media="$RepresentationID$/seg-$Number%05d$.m4s" startNumber="5"/>
            <Representation id="r1"/>
          </AdaptationSet></MPD>"#;
        let check = check_references(xml, dir.path());
        assert!(check.is_complete(), "{:?}", check);
        assert_eq!(check.checked, vec!["r1/seg-00005.m4s".to_string()]);
    }

    #[test]
    fn timeline_repeats_enumerate_every_segment() {
        let xml = r#"<MPD><Period><AdaptationSet>
            <SegmentTemplate timescale="1000" initialization="$RepresentationID$/init.mp4" media="$RepresentationID$/seg-$Number$.m4s" startNumber="1">
              <SegmentTimeline><S t="0" d="4000" r="2"/></SegmentTimeline>
            </SegmentTemplate>
            <Representation id="v1"/>
          </AdaptationSet></Period></MPD>"#;
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "v1/init.mp4");
        write(dir.path(), "v1/seg-1.m4s");
        write(dir.path(), "v1/seg-3.m4s");

        let check = check_references(xml, dir.path());
        assert!(!check.is_complete());
        assert_eq!(check.missing, vec!["v1/seg-2.m4s".to_string()]);

        write(dir.path(), "v1/seg-2.m4s");
        let check = check_references(xml, dir.path());
        assert!(check.is_complete(), "{:?}", check);
        assert_eq!(check.checked.len(), 4);
    }

    #[test]
    fn time_template_follows_timeline() {
        let xml = r#"<MPD mediaPresentationDuration="PT10S"><Period><AdaptationSet>
            <SegmentTemplate timescale="1000" media="$RepresentationID$/$Time$.m4s">
              <SegmentTimeline>
                <S t="0" d="4000" r="-1"/>
              </SegmentTimeline>
            </SegmentTemplate>
            <Representation id="a"/>
          </AdaptationSet></Period></MPD>"#;
        let dir = tempfile::tempdir().unwrap();
        for rel in ["a/0.m4s", "a/4000.m4s"] {
            write(dir.path(), rel);
        }

        let check = check_references(xml, dir.path());
        assert_eq!(check.missing, vec!["a/8000.m4s".to_string()]);
    }

    #[test]
    fn duration_template_counts_from_presentation_length() {
        let xml = r#"<MPD mediaPresentationDuration="PT0H0M11.5S"><Period><AdaptationSet>
            <SegmentTemplate timescale="1000" duration="4000" media="$RepresentationID$/seg-$Number%03d$.m4s" startNumber="1"/>
            <Representation id="v" bandwidth="250000"/>
          </AdaptationSet></Period></MPD>"#;
        let dir = tempfile::tempdir().unwrap();
        for rel in ["v/seg-001.m4s", "v/seg-003.m4s"] {
            write(dir.path(), rel);
        }

        let check = check_references(xml, dir.path());
        assert_eq!(check.missing, vec!["v/seg-002.m4s".to_string()]);
        assert_eq!(check.checked.len(), 2);
    }

    #[test]
    fn bandwidth_identifier_is_substituted() {
        let xml = r#"<MPD><AdaptationSet>
            <SegmentTemplate initialization="$Bandwidth$/init.mp4"/>
            <Representation id="v" bandwidth="750000"/>
          </AdaptationSet></MPD>"#;
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "750000/init.mp4");

        let check = check_references(xml, dir.path());
        assert!(check.is_complete());
        assert_eq!(check.checked, vec!["750000/init.mp4".to_string()]);
    }

    #[test]
    fn unknown_identifiers_are_skipped() {
        let xml = r#"<MPD><AdaptationSet>
            <SegmentTemplate media="$RepresentationID$/$SubNumber$.m4s"/>
            <Representation id="r1"/>
          </AdaptationSet></MPD>"#;
        let dir = tempfile::tempdir().unwrap();
        let check = check_references(xml, dir.path());
        assert!(check.is_complete());
        assert!(check.checked.is_empty());
    }

    #[test]
    fn iso_durations() {
        assert_eq!(parse_iso_duration("PT12S"), Some(12.0));
        assert_eq!(parse_iso_duration("PT1M59.5S"), Some(119.5));
        assert_eq!(parse_iso_duration("P1DT1H"), Some(90_000.0));
        assert_eq!(parse_iso_duration("P1Y"), None);
        assert_eq!(parse_iso_duration("12S"), None);
    }

    #[test]
    fn verify_manifest_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let mpd = dir.path().join("stream.mpd");
        std::fs::write(&mpd, r#"<MPD><Initialization sourceURL="init.mp4"/></MPD>"#).unwrap();
        let check = verify_manifest(&mpd).unwrap();
        assert_eq!(check.missing, vec!["init.mp4".to_string()]);
    }
}
