//! # Document Parser
//!
//! Turns a role document into an ordered sequence of [`RoleDescriptor`]s.
//!
//! - Document order is preserved; it drives removal order later on
//! - Markup errors and schema violations are rejected (`SyncError::Parse`)
//! - Unknown elements inside a role are ignored with a warning
//! - No directory access; parsing is a pure transformation

use crate::primitives::{
    BINARY_TYPE, CREDENTIALS_ELEMENT, MAX_DOCUMENT_BYTES, MAX_ELEMENT_DEPTH, MEMBEROF_ELEMENT,
    NAME_ATTRIBUTE, PROPERTIES_ELEMENT, TYPE_ATTRIBUTE,
};
use crate::{Dictionary, RoleDescriptor, RoleKind, RoleValue, SyncError};
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeSet;
use std::io::Read;

// =============================================================================
// ELEMENT TREE
// =============================================================================

/// One element of the parsed markup.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn from_start(start: &BytesStart<'_>, decoder: Decoder) -> Result<Self, SyncError> {
        let name = decoder.decode(start.name().as_ref())?.into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| SyncError::Parse(format!("<{}>: {}", name, e)))?;
            let key = decoder.decode(attr.key.as_ref())?.into_owned();
            let value = attr.decode_and_unescape_value(decoder)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// All descendant text, concatenated in document order.
    fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }
}

/// Build the element tree for a complete document.
///
/// Exactly one document element is accepted; anything but whitespace,
/// comments and processing instructions outside it is an error.
/// Text is decoded with the encoding named by the BOM or the XML
/// declaration, UTF-8 when neither is present.
fn read_tree(bytes: &[u8]) -> Result<Element, SyncError> {
    let mut reader = Reader::from_reader(bytes);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(SyncError::Parse(
                        "content after the document element".to_string(),
                    ));
                }
                if stack.len() >= MAX_ELEMENT_DEPTH {
                    return Err(SyncError::Parse(format!(
                        "element nesting exceeds {} levels",
                        MAX_ELEMENT_DEPTH
                    )));
                }
                stack.push(Element::from_start(&start, reader.decoder())?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start, reader.decoder())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(SyncError::Parse(
                            "content after the document element".to_string(),
                        ));
                    }
                }
            }
            Event::End(end) => {
                let element = stack.pop().ok_or_else(|| {
                    SyncError::Parse("closing tag without an open element".to_string())
                })?;
                if element.name != reader.decoder().decode(end.name().as_ref())? {
                    return Err(SyncError::Parse(format!(
                        "mismatched closing tag for <{}>",
                        element.name
                    )));
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(text)),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(SyncError::Parse(
                            "text outside the document element".to_string(),
                        ));
                    }
                }
            }
            Event::CData(data) => {
                let text = reader.decoder().decode(&data)?.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(text)),
                    None => {
                        return Err(SyncError::Parse(
                            "CDATA outside the document element".to_string(),
                        ));
                    }
                }
            }
            Event::Eof => break,
            // comments, declarations, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(SyncError::Parse(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| SyncError::Parse("document has no root element".to_string()))
}

// =============================================================================
// ROLE CHILDREN
// =============================================================================

/// Classified child element of a `user` or `group` element.
enum RoleChild<'a> {
    Properties(&'a Element),
    Credentials(&'a Element),
    MemberOf(String),
    Unknown(&'a str),
}

impl<'a> RoleChild<'a> {
    fn classify(element: &'a Element) -> Self {
        match element.name.as_str() {
            PROPERTIES_ELEMENT => Self::Properties(element),
            CREDENTIALS_ELEMENT => Self::Credentials(element),
            MEMBEROF_ELEMENT => Self::MemberOf(element.text_content()),
            other => Self::Unknown(other),
        }
    }
}

/// Copy every element child of a `properties`/`credentials` section into `dict`.
fn read_dictionary(section: &Element, dict: &mut Dictionary) {
    for entry in section.elements() {
        let text = entry.text_content();
        let value = if entry.attribute(TYPE_ATTRIBUTE) == Some(BINARY_TYPE) {
            RoleValue::Binary(text.into_bytes())
        } else {
            RoleValue::Text(text)
        };
        dict.insert(entry.name.clone(), value);
    }
}

fn read_role(element: &Element, kind: RoleKind) -> Result<RoleDescriptor, SyncError> {
    let name = element
        .attribute(NAME_ATTRIBUTE)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            SyncError::Parse(format!(
                "<{}> element without a '{}' attribute",
                element.name, NAME_ATTRIBUTE
            ))
        })?;

    let mut role = RoleDescriptor::new(name, kind);
    for child in element.elements() {
        match RoleChild::classify(child) {
            RoleChild::Properties(section) => read_dictionary(section, &mut role.properties),
            RoleChild::Credentials(section) => read_dictionary(section, &mut role.credentials),
            RoleChild::MemberOf(group) => role.member_of.push(group),
            RoleChild::Unknown(tag) => {
                tracing::warn!(role = %role.name, element = tag, "ignoring unknown role element");
            }
        }
    }
    Ok(role)
}

// =============================================================================
// PARSER
// =============================================================================

/// Parser for role documents.
pub struct DocumentParser;

impl DocumentParser {
    /// Parse a role document from a byte stream.
    ///
    /// Returns every `user`/`group` element of the document as a descriptor,
    /// in document order.
    ///
    /// # Errors
    /// Returns `SyncError::Parse` if:
    /// - the markup is not well-formed, or the stream exceeds `MAX_DOCUMENT_BYTES`
    /// - the root holds an element other than `user` or `group`
    /// - a role has no `name` attribute, or a name appears twice
    ///
    /// Read failures are reported as `SyncError::Io`.
    pub fn parse(input: impl Read) -> Result<Vec<RoleDescriptor>, SyncError> {
        let mut bytes = Vec::new();
        input
            .take(MAX_DOCUMENT_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| SyncError::Io(format!("read document: {}", e)))?;
        if bytes.len() as u64 > MAX_DOCUMENT_BYTES {
            return Err(SyncError::Parse(format!(
                "document exceeds {} bytes",
                MAX_DOCUMENT_BYTES
            )));
        }
        Self::parse_bytes(&bytes)
    }

    /// Parse a role document held in memory.
    pub fn parse_str(document: &str) -> Result<Vec<RoleDescriptor>, SyncError> {
        Self::parse(document.as_bytes())
    }

    fn parse_bytes(bytes: &[u8]) -> Result<Vec<RoleDescriptor>, SyncError> {
        let root = read_tree(bytes)?;
        let mut seen = BTreeSet::new();
        let mut roles = Vec::new();

        for element in root.elements() {
            let kind = RoleKind::from_tag(&element.name).ok_or_else(|| {
                SyncError::Parse(format!(
                    "unexpected <{}> in <{}>, expected <user> or <group>",
                    element.name, root.name
                ))
            })?;
            let role = read_role(element, kind)?;
            if !seen.insert(role.name.clone()) {
                return Err(SyncError::Parse(format!(
                    "role '{}' is declared more than once",
                    role.name
                )));
            }
            roles.push(role);
        }

        tracing::debug!(roles = roles.len(), "parsed role document");
        Ok(roles)
    }

    /// Check that a document parses, discarding the result.
    pub fn validate(input: impl Read) -> Result<(), SyncError> {
        Self::parse(input).map(|_| ())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<roles>
    <!-- operators -->
    <group name="admins">
        <properties>
            <description>Administrators</description>
        </properties>
    </group>
    <user name="alice">
        <memberof>admins</memberof>
        <properties>
            <email>alice@example.com</email>
            <avatar type="byte[]">AQID</avatar>
        </properties>
        <credentials>
            <password>secret</password>
            <key type="byte[]">k3y</key>
        </credentials>
        <memberof>staff</memberof>
    </user>
</roles>"#;

    #[test]
    fn parses_roles_in_document_order() {
        let roles = DocumentParser::parse_str(SAMPLE).expect("parse");

        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].name, "admins");
        assert_eq!(roles[0].kind, RoleKind::Group);
        assert_eq!(roles[1].name, "alice");
        assert_eq!(roles[1].kind, RoleKind::User);
    }

    #[test]
    fn reads_properties_credentials_and_memberships() {
        let roles = DocumentParser::parse_str(SAMPLE).expect("parse");
        let alice = &roles[1];

        assert_eq!(
            alice.properties.get("email"),
            Some(&RoleValue::text("alice@example.com"))
        );
        assert_eq!(
            alice.properties.get("avatar"),
            Some(&RoleValue::binary(b"AQID".to_vec()))
        );
        assert_eq!(
            alice.credentials.get("password"),
            Some(&RoleValue::text("secret"))
        );
        assert_eq!(
            alice.credentials.get("key"),
            Some(&RoleValue::binary(b"k3y".to_vec()))
        );
        assert_eq!(alice.member_of, vec!["admins", "staff"]);
    }

    #[test]
    fn empty_role_elements_are_allowed() {
        let roles =
            DocumentParser::parse_str(r#"<roles><group name="g"/><user name="u"></user></roles>"#)
                .expect("parse");

        assert_eq!(roles.len(), 2);
        assert!(roles[0].properties.is_empty());
        assert!(roles[1].member_of.is_empty());
    }

    #[test]
    fn escaped_text_is_unescaped() {
        let roles = DocumentParser::parse_str(
            r#"<roles><user name="u"><properties><cn>A &amp; B</cn></properties></user></roles>"#,
        )
        .expect("parse");

        assert_eq!(
            roles[0].properties.get("cn"),
            Some(&RoleValue::text("A & B"))
        );
    }

    #[test]
    fn property_text_is_not_trimmed() {
        let roles = DocumentParser::parse_str(
            r#"<roles><user name="u"><properties><motd>  hi  </motd></properties></user></roles>"#,
        )
        .expect("parse");

        assert_eq!(
            roles[0].properties.get("motd"),
            Some(&RoleValue::text("  hi  "))
        );
    }

    #[test]
    fn memberof_text_is_kept_verbatim() {
        let roles = DocumentParser::parse_str(
            r#"<roles><user name="u"><memberof> staff </memberof><memberof/></user></roles>"#,
        )
        .expect("parse");

        assert_eq!(roles[0].member_of, vec![" staff ", ""]);
    }

    #[test]
    fn parses_latin1_declared_document() {
        let document: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
<roles><user name=\"jos\xE9\"><properties><cn title=\"Se\xF1or\">Jos\xE9</cn></properties>\
<memberof>caf\xE9</memberof></user></roles>";

        let roles = DocumentParser::parse(document).expect("parse");

        assert_eq!(roles[0].name, "jos\u{e9}");
        assert_eq!(
            roles[0].properties.get("cn"),
            Some(&RoleValue::text("Jos\u{e9}"))
        );
        assert_eq!(roles[0].member_of, vec!["caf\u{e9}"]);
    }

    #[test]
    fn utf8_bom_is_accepted() {
        let mut document = vec![0xEF, 0xBB, 0xBF];
        document.extend_from_slice("<roles><group name=\"gr\u{fc}n\"/></roles>".as_bytes());

        let roles = DocumentParser::parse(document.as_slice()).expect("parse");
        assert_eq!(roles[0].name, "gr\u{fc}n");
    }

    #[test]
    fn unknown_role_children_are_ignored() {
        let roles = DocumentParser::parse_str(
            r#"<roles><user name="u"><nickname>x</nickname><memberof>g</memberof></user></roles>"#,
        )
        .expect("parse");

        assert_eq!(roles[0].member_of, vec!["g"]);
        assert!(roles[0].properties.is_empty());
    }

    #[test]
    fn rejects_malformed_markup() {
        let result = DocumentParser::parse_str("<roles><user name=\"u\"></roles>");
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn rejects_truncated_document() {
        let result = DocumentParser::parse_str("<roles><user name=\"u\">");
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn rejects_empty_document() {
        assert!(matches!(
            DocumentParser::parse_str(""),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(
            DocumentParser::parse_str("<?xml version=\"1.0\"?>\n"),
            Err(SyncError::Parse(_))
        ));
    }

    #[test]
    fn rejects_second_root() {
        let result = DocumentParser::parse_str("<roles/><roles/>");
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn rejects_missing_name() {
        let result = DocumentParser::parse_str("<roles><user/></roles>");
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn rejects_unknown_role_tag() {
        let result = DocumentParser::parse_str(r#"<roles><robot name="r2"/></roles>"#);
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn rejects_duplicate_names() {
        let result =
            DocumentParser::parse_str(r#"<roles><user name="a"/><group name="a"/></roles>"#);
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn rejects_oversized_document() {
        let filler = vec![b' '; (MAX_DOCUMENT_BYTES + 1) as usize];
        let result = DocumentParser::parse(filler.as_slice());
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn validate_reports_errors_only() {
        assert!(DocumentParser::validate(SAMPLE.as_bytes()).is_ok());
        assert!(DocumentParser::validate("<roles>".as_bytes()).is_err());
    }
}
