use roxmltree::{Document, Node, ParsingOptions};
use thiserror::Error;

use crate::steam_id::SteamId;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("group roster is not valid xml: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// What we could read out of a `memberslistxml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub group_id64: Option<u64>,
    pub group_name: Option<String>,
    pub member_count: Option<u64>,
    /// In document order. May contain duplicates.
    pub members: Vec<SteamId>,
    /// Non-empty `steamID64` nodes that didn't hold a player id.
    pub rejected: usize,
}

impl Roster {
    /// Steam only lists the first thousand members per page.
    pub fn is_partial(&self) -> bool {
        matches!(self.member_count, Some(count) if count > self.members.len() as u64)
    }
}

/// Parses the whole document first, so a malformed roster yields nothing at all.
///
/// Member ids are taken from every `steamID64` element below a `members`
/// element, wherever that sits in the document.
pub fn parse_roster(xml: &str) -> Result<Roster, RosterError> {
    // Steam may put a doctype in front, which roxmltree refuses by default.
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let doc = Document::parse_with_options(xml, options)?;
    let mut roster = Roster::default();

    for node in doc.descendants().filter(|n| n.has_tag_name("steamID64")) {
        if !node.ancestors().skip(1).any(|a| a.has_tag_name("members")) {
            continue;
        }

        let text = match node.text().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => continue,
        };

        match text.parse::<SteamId>() {
            Ok(id) => roster.members.push(id),
            Err(err) => {
                trace!("Skipping roster entry: {}", err);
                roster.rejected += 1;
            }
        }
    }

    roster.group_id64 = first_text(&doc, "groupID64").and_then(|s| s.parse().ok());
    roster.member_count = first_text(&doc, "memberCount").and_then(|s| s.parse().ok());
    roster.group_name = doc
        .descendants()
        .find(|n| n.has_tag_name("groupDetails"))
        .and_then(|details| child_text(details, "groupName"))
        .map(str::to_owned);

    Ok(roster)
}

fn first_text<'a>(doc: &'a Document<'_>, tag: &str) -> Option<&'a str> {
    doc.descendants()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(str::trim)
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEAM_ROSTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<memberList>
<groupID64>103582791429521413</groupID64>
<groupDetails>
  <groupName><![CDATA[Server Admins]]></groupName>
  <groupURL><![CDATA[serveradmins]]></groupURL>
  <memberCount>3</memberCount>
</groupDetails>
<memberCount>3</memberCount>
<totalPages>1</totalPages>
<currentPage>1</currentPage>
<startingMember>0</startingMember>
<members>
<steamID64>76561198000000001</steamID64>
<steamID64>76561198000000002</steamID64>
<steamID64>76561198000000003</steamID64>
</members>
</memberList>"#;

    fn id(raw: u64) -> SteamId {
        SteamId::try_from(raw).unwrap()
    }

    #[test]
    fn reads_steam_roster() {
        let roster = parse_roster(STEAM_ROSTER).unwrap();
        assert_eq!(roster.group_id64, Some(103582791429521413));
        assert_eq!(roster.group_name.as_deref(), Some("Server Admins"));
        assert_eq!(roster.member_count, Some(3));
        assert_eq!(roster.members, vec![id(76561198000000001), id(76561198000000002), id(76561198000000003)]);
        assert_eq!(roster.rejected, 0);
        assert!(!roster.is_partial());
    }

    #[test]
    fn doctype_is_accepted() {
        let xml = STEAM_ROSTER.replacen("<memberList>", "<!DOCTYPE memberList>\n<memberList>", 1);
        let roster = parse_roster(&xml).unwrap();
        assert_eq!(roster.members.len(), 3);
        assert_eq!(roster.group_name.as_deref(), Some("Server Admins"));
    }

    #[test]
    fn nested_member_elements() {
        let xml = "<memberList><members><member><steamID64>76561198000000001</steamID64></member></members></memberList>";
        let roster = parse_roster(xml).unwrap();
        assert_eq!(roster.members, vec![id(76561198000000001)]);
    }

    #[test]
    fn root_name_is_not_assumed() {
        let xml = "<whatever><deeper><members><steamID64>76561198000000001</steamID64></members></deeper></whatever>";
        assert_eq!(parse_roster(xml).unwrap().members.len(), 1);
    }

    #[test]
    fn ids_outside_members_are_ignored() {
        let xml = "<memberList>\
            <steamID64>76561198000000009</steamID64>\
            <members><steamID64>76561198000000001</steamID64></members>\
        </memberList>";
        assert_eq!(parse_roster(xml).unwrap().members, vec![id(76561198000000001)]);
    }

    #[test]
    fn malformed_entries_are_counted_not_kept() {
        let xml = "<memberList><members>\
            <steamID64>garbage</steamID64>\
            <steamID64>76561198000000002</steamID64>\
            <steamID64></steamID64>\
            <steamID64>103582791429521413</steamID64>\
            <steamID64>76561198000000001</steamID64>\
            <steamID64>-1</steamID64>\
        </members></memberList>";
        let roster = parse_roster(xml).unwrap();
        assert_eq!(roster.members, vec![id(76561198000000002), id(76561198000000001)]);
        assert_eq!(roster.rejected, 3);
    }

    #[test]
    fn duplicates_are_kept() {
        let xml = "<memberList><members>\
            <steamID64>76561198000000001</steamID64>\
            <steamID64>76561198000000001</steamID64>\
        </members></memberList>";
        assert_eq!(parse_roster(xml).unwrap().members.len(), 2);
    }

    #[test]
    fn malformed_document_yields_nothing() {
        let xml = "<memberList><members><steamID64>76561198000000001</steamID64></members>";
        assert!(matches!(parse_roster(xml), Err(RosterError::Xml(_))));
        assert!(parse_roster("<html><body>Service Unavailable").is_err());
        assert!(parse_roster("").is_err());
    }

    #[test]
    fn first_page_of_big_group() {
        let xml = "<memberList><memberCount>2500</memberCount><members>\
            <steamID64>76561198000000001</steamID64>\
        </members></memberList>";
        let roster = parse_roster(xml).unwrap();
        assert!(roster.is_partial());
    }

    #[test]
    fn empty_group() {
        let xml = "<memberList><memberCount>0</memberCount><members></members></memberList>";
        let roster = parse_roster(xml).unwrap();
        assert!(roster.members.is_empty());
        assert!(!roster.is_partial());
    }
}
