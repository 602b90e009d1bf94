use crate::broker::errors::{ProviderError, ProviderResult};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

const ATOM_NS: Namespace<'static> = Namespace(b"http://www.w3.org/2005/Atom");

/// One `entry` of a resource listing feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeedEntry {
    pub id: String,
    pub published_at: DateTime<Utc>,
}

#[derive(PartialEq)]
enum EntryField {
    Title,
    Published,
}

/// Parses the entries of an Atom resource feed, in document order.
///
/// Elements count only when they resolve to the Atom namespace, so
/// description payloads in other namespaces cannot be mistaken for feed
/// structure. The feed's own `title` outside any entry is ignored. An
/// entry missing its `title` or `published`, or carrying a timestamp that
/// is not RFC 3339, fails the whole parse; entries are never silently
/// skipped.
pub(crate) fn parse_entries(xml: &str) -> ProviderResult<Vec<FeedEntry>> {
    let mut reader = NsReader::from_str(xml);

    let mut entries = Vec::new();
    let mut saw_feed = false;
    let mut in_entry = false;
    let mut field: Option<EntryField> = None;
    let mut text = String::new();
    let mut title: Option<String> = None;
    let mut published: Option<String> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((ResolveResult::Bound(ns), Event::Start(e))) if ns == ATOM_NS => {
                match e.local_name().as_ref() {
                    b"feed" => saw_feed = true,
                    b"entry" => {
                        in_entry = true;
                        title = None;
                        published = None;
                    }
                    b"title" if in_entry => {
                        field = Some(EntryField::Title);
                        text.clear();
                    }
                    b"published" if in_entry => {
                        field = Some(EntryField::Published);
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok((ResolveResult::Bound(ns), Event::Empty(e))) if ns == ATOM_NS => {
                if e.local_name().as_ref() == b"entry" {
                    return Err(malformed("entry has no title"));
                }
            }
            Ok((_, Event::Text(e))) => {
                if field.is_some() {
                    let chunk = e
                        .unescape()
                        .map_err(|e| malformed(format!("unreadable text node: {e}")))?;
                    text.push_str(&chunk);
                }
            }
            Ok((ResolveResult::Bound(ns), Event::End(e))) if ns == ATOM_NS => {
                match e.local_name().as_ref() {
                    b"title" if field == Some(EntryField::Title) => {
                        title = Some(text.trim().to_string());
                        field = None;
                    }
                    b"published" if field == Some(EntryField::Published) => {
                        published = Some(text.trim().to_string());
                        field = None;
                    }
                    b"entry" if in_entry => {
                        entries.push(finish_entry(title.take(), published.take())?);
                        in_entry = false;
                    }
                    _ => {}
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e.to_string())),
        }
    }

    if entries.is_empty() && !saw_feed {
        return Err(malformed("document is not an Atom feed"));
    }
    Ok(entries)
}

fn finish_entry(
    title: Option<String>,
    published: Option<String>,
) -> ProviderResult<FeedEntry> {
    let id = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("entry has no title"))?;
    let raw = published
        .ok_or_else(|| malformed(format!("entry '{id}' has no published timestamp")))?;
    let published_at = DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| malformed(format!("entry '{id}' has a bad published timestamp: {e}")))?
        .with_timezone(&Utc);
    Ok(FeedEntry { id, published_at })
}

fn malformed(reason: impl Into<String>) -> ProviderError {
    ProviderError::MalformedFeed {
        reason: reason.into(),
    }
}
