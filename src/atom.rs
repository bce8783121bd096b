//! Atom 1.0 feed generation.
//!
//! Feeds are plain strings as far as the build pipeline is concerned:
//! generate the XML here, then register it as a static asset so the builder
//! writes it verbatim instead of appending `.html`.
//!
//! ```text
//! let xml = atom::feed(&config, &entries)?;
//! let site = Config::new("public")
//!     .add_static_route("/", index)
//!     .add_static_asset("/feed.xml", xml);
//! ```

use atom_syndication::{
    Entry, EntryBuilder, FeedBuilder, FixedDateTime, GeneratorBuilder, LinkBuilder, Person,
    PersonBuilder, Text,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid RFC 3339 timestamp: {0}")]
    Date(#[from] chrono::ParseError),
}

/// Feed-level fields. `id` is the feed's Atom identifier, usually the site
/// URL; `site_url` is where the alternate link points.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub site_url: String,
    pub author: String,
    pub author_email: Option<String>,
}

/// One feed entry. `updated` is an RFC 3339 timestamp; `url` doubles as the
/// entry's Atom id.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub updated: String,
    pub summary: Option<String>,
}

/// Build the Atom XML document. The feed's own `updated` is the latest
/// entry timestamp, the epoch when there are no entries. Entries keep their
/// input order.
pub fn feed(config: &FeedConfig, entries: &[FeedEntry]) -> Result<String, FeedError> {
    let mut latest: Option<FixedDateTime> = None;
    let mut atom_entries: Vec<Entry> = Vec::with_capacity(entries.len());
    for entry in entries {
        let updated: FixedDateTime = entry.updated.parse()?;
        latest = Some(match latest {
            Some(prev) if prev >= updated => prev,
            _ => updated,
        });
        let link = LinkBuilder::default()
            .href(entry.url.clone())
            .rel("alternate".to_string())
            .build();
        atom_entries.push(
            EntryBuilder::default()
                .title(Text::plain(entry.title.clone()))
                .id(entry.url.clone())
                .updated(updated)
                .links(vec![link])
                .summary(entry.summary.clone().map(Text::plain))
                .build(),
        );
    }

    let author: Person = PersonBuilder::default()
        .name(config.author.clone())
        .email(config.author_email.clone())
        .build();
    let alternate = LinkBuilder::default()
        .href(config.site_url.clone())
        .rel("alternate".to_string())
        .build();
    let feed = FeedBuilder::default()
        .title(Text::plain(config.title.clone()))
        .id(config.id.clone())
        .updated(latest.unwrap_or_default())
        .authors(vec![author])
        .links(vec![alternate])
        .generator(Some(GeneratorBuilder::default().value("sitestage").build()))
        .entries(atom_entries)
        .build();
    Ok(feed.to_string())
}
