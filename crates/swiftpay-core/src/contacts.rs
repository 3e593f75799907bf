use serde::{Deserialize, Serialize};

use crate::device::{ContactsProvider, Permission, PermissionStatus, Permissions, RawContact};
use crate::error::{Error, Result};
use crate::notice::{NoticeBoard, NoticeKind, NoticeTimings};

pub const CONTACTS_DENIED_MESSAGE: &str = "Unable to access contacts";

const AVATAR_BASE_URL: &str =
    "https://ui-avatars.com/api/?background=A767C2&bold=true&color=fff&name=";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone: String,
}

impl Contact {
    /// Flatten a device entry. Entries without a name or without any phone
    /// number are dropped; only the first number is kept.
    pub fn from_raw(raw: RawContact) -> Option<Self> {
        let name = raw.name.filter(|n| !n.trim().is_empty())?;
        let phone = raw.phone_numbers.into_iter().next()?;
        Some(Self {
            id: raw.id,
            name,
            phone,
        })
    }

    /// `needle` must already be lowercased.
    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.phone.to_lowercase().contains(needle)
    }
}

pub fn normalize(raw: Vec<RawContact>) -> Vec<Contact> {
    raw.into_iter().filter_map(Contact::from_raw).collect()
}

/// Ask for contacts access, then read and normalize the address book.
pub async fn list_contacts<P, C>(permissions: &P, provider: &C) -> Result<Vec<Contact>>
where
    P: Permissions,
    C: ContactsProvider,
{
    match permissions.request(Permission::Contacts).await? {
        PermissionStatus::Granted => {}
        PermissionStatus::Denied => return Err(Error::PermissionDenied(Permission::Contacts)),
    }
    let raw = provider.query().await?;
    let total = raw.len();
    let contacts = normalize(raw);
    log::debug!("contacts: kept {} of {total} device entries", contacts.len());
    Ok(contacts)
}

/// Case-insensitive substring search over name and phone. An empty query
/// matches everything.
pub fn filter<'a>(contacts: &'a [Contact], query: &str) -> Vec<&'a Contact> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return contacts.iter().collect();
    }
    contacts.iter().filter(|c| c.matches(&needle)).collect()
}

pub fn avatar_url(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    format!("{AVATAR_BASE_URL}{}", words.join("+"))
}

/// State behind the Pay screen: the contact list fetched once per visit and
/// the live search query.
pub struct PayScreen {
    contacts: Vec<Contact>,
    query: String,
    loaded: bool,
    notices: NoticeBoard,
}

impl PayScreen {
    pub fn new(timings: NoticeTimings) -> Self {
        Self {
            contacts: Vec::new(),
            query: String::new(),
            loaded: false,
            notices: NoticeBoard::new(timings),
        }
    }

    /// Fold the result of [`list_contacts`] into the screen.
    pub fn apply_load(&mut self, result: Result<Vec<Contact>>) {
        self.loaded = true;
        match result {
            Ok(contacts) => self.contacts = contacts,
            Err(Error::PermissionDenied(_)) => {
                self.notices.show(CONTACTS_DENIED_MESSAGE, NoticeKind::Error);
            }
            Err(e) => {
                log::warn!("pay screen: contact load failed: {e}");
                self.notices.show(CONTACTS_DENIED_MESSAGE, NoticeKind::Error);
            }
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn visible(&self) -> Vec<&Contact> {
        filter(&self.contacts, &self.query)
    }

    pub fn find(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, name: Option<&str>, phones: &[&str]) -> RawContact {
        RawContact {
            id: id.to_string(),
            name: name.map(str::to_string),
            phone_numbers: phones.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn sample() -> Vec<Contact> {
        normalize(vec![
            raw("1", Some("Alex Morgan"), &["+91 98765 43210"]),
            raw("2", Some("Kaira"), &["555-0101", "555-0102"]),
            raw("3", Some("Elly"), &["555-0199"]),
        ])
    }

    #[test]
    fn normalize_drops_incomplete_entries() {
        let contacts = normalize(vec![
            raw("1", Some("Alex"), &["111"]),
            raw("2", None, &["222"]),
            raw("3", Some("  "), &["333"]),
            raw("4", Some("Scott"), &[]),
        ]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, "1");
    }

    #[test]
    fn normalize_takes_first_phone() {
        let contacts = sample();
        let kaira = contacts.iter().find(|c| c.name == "Kaira").unwrap();
        assert_eq!(kaira.phone, "555-0101");
    }

    #[test]
    fn filter_is_case_insensitive_on_name() {
        let contacts = sample();
        let hits = filter(&contacts, "aLeX");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Alex Morgan");
    }

    #[test]
    fn filter_matches_phone() {
        let contacts = sample();
        let hits = filter(&contacts, "0199");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Elly");
    }

    #[test]
    fn filter_results_are_subset_and_match() {
        let contacts = sample();
        for query in ["", "a", "555", "ELLY", "zzz", "98765"] {
            let hits = filter(&contacts, query);
            let needle = query.to_lowercase();
            for hit in &hits {
                assert!(contacts.contains(*hit));
                assert!(
                    hit.name.to_lowercase().contains(&needle)
                        || hit.phone.to_lowercase().contains(&needle)
                );
            }
        }
    }

    #[test]
    fn empty_query_returns_everything() {
        let contacts = sample();
        assert_eq!(filter(&contacts, "").len(), contacts.len());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let contacts = sample();
        assert!(filter(&contacts, "nobody").is_empty());
    }

    #[test]
    fn avatar_url_joins_words() {
        assert_eq!(
            avatar_url("Alex Morgan"),
            "https://ui-avatars.com/api/?background=A767C2&bold=true&color=fff&name=Alex+Morgan"
        );
    }
}
