use crate::jid::Jid;
use crate::xml::error::{Result, XmlError};
use crate::xml::node::{Attrs, Node};
use std::str::FromStr;

/// Accumulating attribute reader. Lookups never fail outright; problems are
/// collected in `errors` and surfaced through [`AttrParser::finish`].
pub struct AttrParser<'a> {
    attrs: &'a Attrs,
    pub errors: Vec<XmlError>,
}

impl<'a> AttrParser<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self {
            attrs: &node.attrs,
            errors: Vec::new(),
        }
    }

    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&self) -> Result<()> {
        if self.ok() {
            Ok(())
        } else {
            Err(XmlError::AttrList(self.errors.clone()))
        }
    }

    fn get_raw(&mut self, key: &str, require: bool) -> Option<&'a String> {
        let val = self.attrs.get(key);
        if require && val.is_none() {
            self.errors.push(XmlError::AttrParse(format!(
                "Required attribute '{key}' not found"
            )));
        }
        val
    }

    pub fn optional_string(&mut self, key: &str) -> Option<&'a str> {
        self.get_raw(key, false).map(|s| s.as_str())
    }

    pub fn string(&mut self, key: &str) -> String {
        self.get_raw(key, true).cloned().unwrap_or_default()
    }

    pub fn optional_jid(&mut self, key: &str) -> Option<Jid> {
        self.get_raw(key, false).and_then(|s| match Jid::from_str(s) {
            Ok(jid) => Some(jid),
            Err(e) => {
                self.errors.push(XmlError::from(e));
                None
            }
        })
    }

    pub fn jid(&mut self, key: &str) -> Jid {
        self.get_raw(key, true);
        self.optional_jid(key).unwrap_or_default()
    }

    /// Reads an XML boolean (`true`/`false`/`1`/`0`). Absent means `false`.
    pub fn optional_bool(&mut self, key: &str) -> bool {
        match self.get_raw(key, false).map(String::as_str) {
            None => false,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                self.errors.push(XmlError::AttrParse(format!(
                    "Failed to parse bool from '{other}' for key '{key}'"
                )));
                false
            }
        }
    }

    pub fn optional_u64(&mut self, key: &str) -> Option<u64> {
        self.get_raw(key, false).and_then(|s| match s.parse::<u64>() {
            Ok(val) => Some(val),
            Err(e) => {
                self.errors.push(XmlError::AttrParse(format!(
                    "Failed to parse u64 from '{s}' for key '{key}': {e}"
                )));
                None
            }
        })
    }
}
