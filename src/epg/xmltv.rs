//! XMLTV stream parsing (§4.E step 2).
//!
//! Event-driven via `quick_xml`'s pull reader rather than building a DOM,
//! so a multi-hundred-megabyte guide never has to be fully materialized —
//! the same streaming-reader shape the teacher reaches for whenever it
//! walks an XML document (see its `quick-xml` use in the mapping engine).

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::EpgError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChannel {
    pub channel_id: String,
    pub display_names: Vec<String>,
    pub icon: Option<String>,
    pub lcn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProgramme {
    pub channel_id: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub title: String,
    pub sub_title: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub episode_num: Option<String>,
    pub rating: Option<String>,
    pub icon: Option<String>,
}

/// Parses one XMLTV document, invoking `on_channel`/`on_programme` for each
/// element as it's read. A malformed `<programme>` or `<channel>` element
/// is skipped with an `EpgError::ParseError` passed to `on_error`, per the
/// "element boundary" error policy in §7 — it never aborts the whole feed.
pub fn parse_xmltv(
    source_id: &str,
    xml: &[u8],
    mut on_channel: impl FnMut(ParsedChannel),
    mut on_programme: impl FnMut(ParsedProgramme),
    mut on_error: impl FnMut(EpgError),
) -> Result<(), EpgError> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut current_channel: Option<ParsedChannel> = None;
    let mut current_programme: Option<PartialProgramme> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                let name = tag.name();
                let local = local_name(name.as_ref());
                match local {
                    "channel" => {
                        current_channel = Some(ParsedChannel {
                            channel_id: attr(&tag, "id").unwrap_or_default(),
                            ..Default::default()
                        });
                    }
                    "programme" => {
                        let channel_id = attr(&tag, "channel").unwrap_or_default();
                        let start = attr(&tag, "start");
                        let stop = attr(&tag, "stop");
                        match (parse_xmltv_time(start.as_deref()), parse_xmltv_time(stop.as_deref())) {
                            (Some(start), Some(stop)) => {
                                current_programme = Some(PartialProgramme {
                                    channel_id,
                                    start,
                                    stop,
                                    title: String::new(),
                                    sub_title: None,
                                    description: None,
                                    categories: Vec::new(),
                                    episode_num: None,
                                    rating: None,
                                    icon: None,
                                });
                            }
                            _ => {
                                on_error(EpgError::ParseError {
                                    source_id: source_id.to_string(),
                                    context: format!("programme channel={channel_id}"),
                                    message: "missing or unparsable start/stop timestamp".to_string(),
                                });
                                current_programme = None;
                            }
                        }
                    }
                    "icon" => {
                        if let Some(src) = attr(&tag, "src") {
                            if let Some(channel) = current_channel.as_mut() {
                                channel.icon = Some(src.clone());
                            }
                            if let Some(programme) = current_programme.as_mut() {
                                programme.icon = Some(src);
                            }
                        }
                    }
                    _ => {}
                }
                text_buf.clear();
            }
            Ok(Event::Text(text)) => {
                text_buf.push_str(&text.unescape().unwrap_or_default());
            }
            Ok(Event::End(tag)) => {
                let local = local_name(tag.name().as_ref());
                match local {
                    "display-name" => {
                        if let Some(channel) = current_channel.as_mut() {
                            if !text_buf.trim().is_empty() {
                                channel.display_names.push(text_buf.trim().to_string());
                            }
                        }
                    }
                    "lcn" => {
                        if let Some(channel) = current_channel.as_mut() {
                            channel.lcn = Some(text_buf.trim().to_string());
                        }
                    }
                    "title" => set_if_programme(&mut current_programme, |p| p.title = text_buf.trim().to_string()),
                    "sub-title" => {
                        set_if_programme(&mut current_programme, |p| p.sub_title = Some(text_buf.trim().to_string()))
                    }
                    "desc" => {
                        set_if_programme(&mut current_programme, |p| p.description = Some(text_buf.trim().to_string()))
                    }
                    "category" => set_if_programme(&mut current_programme, |p| {
                        if !text_buf.trim().is_empty() {
                            p.categories.push(text_buf.trim().to_string());
                        }
                    }),
                    "episode-num" => {
                        set_if_programme(&mut current_programme, |p| p.episode_num = Some(text_buf.trim().to_string()))
                    }
                    "value" => {
                        // `<rating><value>PG</value></rating>` — attribute-less leaf.
                        set_if_programme(&mut current_programme, |p| p.rating = Some(text_buf.trim().to_string()))
                    }
                    "channel" => {
                        if let Some(channel) = current_channel.take() {
                            if channel.channel_id.is_empty() {
                                on_error(EpgError::ParseError {
                                    source_id: source_id.to_string(),
                                    context: "channel".to_string(),
                                    message: "channel element missing id attribute".to_string(),
                                });
                            } else {
                                on_channel(channel);
                            }
                        }
                    }
                    "programme" => {
                        if let Some(programme) = current_programme.take() {
                            if programme.title.is_empty() || programme.channel_id.is_empty() {
                                on_error(EpgError::ParseError {
                                    source_id: source_id.to_string(),
                                    context: format!("programme channel={}", programme.channel_id),
                                    message: "programme missing title or channel id".to_string(),
                                });
                            } else {
                                on_programme(programme.into());
                            }
                        }
                    }
                    _ => {}
                }
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                on_error(EpgError::ParseError {
                    source_id: source_id.to_string(),
                    context: "xml tokenizer".to_string(),
                    message: err.to_string(),
                });
                break;
            }
        }
        buf.clear();
    }

    Ok(())
}

fn set_if_programme(programme: &mut Option<PartialProgramme>, f: impl FnOnce(&mut PartialProgramme)) {
    if let Some(p) = programme.as_mut() {
        f(p);
    }
}

struct PartialProgramme {
    channel_id: String,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    title: String,
    sub_title: Option<String>,
    description: Option<String>,
    categories: Vec<String>,
    episode_num: Option<String>,
    rating: Option<String>,
    icon: Option<String>,
}

impl From<PartialProgramme> for ParsedProgramme {
    fn from(p: PartialProgramme) -> Self {
        ParsedProgramme {
            channel_id: p.channel_id,
            start: p.start,
            stop: p.stop,
            title: p.title,
            sub_title: p.sub_title,
            description: p.description,
            categories: p.categories,
            episode_num: p.episode_num,
            rating: p.rating,
            icon: p.icon,
        }
    }
}

fn local_name(qualified: &[u8]) -> &str {
    let s = std::str::from_utf8(qualified).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}

fn attr(tag: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    tag.attributes().flatten().find_map(|a| {
        if local_name(a.key.as_ref()) == name {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Parses `YYYYMMDDHHMMSS [+-]HHMM` (XMLTV's canonical timestamp format).
fn parse_xmltv_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    let (datetime_part, offset_part) = raw.split_once(' ').unwrap_or((raw, "+0000"));
    let naive = NaiveDateTime::parse_from_str(datetime_part, "%Y%m%d%H%M%S").ok()?;
    let offset = FixedOffset::from_str_offset(offset_part)?;
    Some(offset.from_local_datetime(&naive).single()?.with_timezone(&Utc))
}

/// Small helper trait so `parse_xmltv_time` reads naturally; `chrono`
/// doesn't expose a public "+HHMM" string parser directly.
trait FixedOffsetExt {
    fn from_str_offset(s: &str) -> Option<FixedOffset>;
}

impl FixedOffsetExt for FixedOffset {
    fn from_str_offset(s: &str) -> Option<FixedOffset> {
        let s = s.trim();
        if s.len() != 5 {
            return None;
        }
        let sign = match s.as_bytes()[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return None,
        };
        let hours: i32 = s[1..3].parse().ok()?;
        let minutes: i32 = s[3..5].parse().ok()?;
        let total_seconds = sign * (hours * 3600 + minutes * 60);
        FixedOffset::east_opt(total_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="X">
    <display-name>ABC</display-name>
    <display-name>ABC HD</display-name>
    <icon src="http://example/x.png"/>
  </channel>
  <programme channel="X" start="20260101060000 +0000" stop="20260101063000 +0000">
    <title>Morning Show</title>
    <category>News</category>
  </programme>
  <programme channel="X" start="bad" stop="bad">
    <title>Broken</title>
  </programme>
</tv>"#;

    #[test]
    fn parses_channels_and_programmes_and_reports_element_errors() {
        let mut channels = Vec::new();
        let mut programmes = Vec::new();
        let mut errors = Vec::new();
        parse_xmltv(
            "src1",
            SAMPLE.as_bytes(),
            |c| channels.push(c),
            |p| programmes.push(p),
            |e| errors.push(e),
        )
        .unwrap();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_id, "X");
        assert_eq!(channels[0].display_names, vec!["ABC".to_string(), "ABC HD".to_string()]);
        assert_eq!(channels[0].icon.as_deref(), Some("http://example/x.png"));

        assert_eq!(programmes.len(), 1);
        assert_eq!(programmes[0].title, "Morning Show");
        assert_eq!(programmes[0].categories, vec!["News".to_string()]);

        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn parses_positive_and_negative_offsets() {
        assert!(parse_xmltv_time(Some("20260101120000 +0100")).is_some());
        assert!(parse_xmltv_time(Some("20260101120000 -0500")).is_some());
        assert!(parse_xmltv_time(Some("garbage")).is_none());
    }
}
