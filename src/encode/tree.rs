//! Element tree built from output parameters.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::xml::check_element_name;
use crate::error::{Error, Result};
use crate::types::{OutputParameter, Value};

/// Name of the tree's root element.
pub const ROOT_ELEMENT: &str = "Root";

/// A named element with text content and child elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Create an element with text and no children.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Build the `Root` element with one child per output parameter.
    ///
    /// Character large objects are drained to completion; every other
    /// value uses its string form. Parameter names must be valid XML names.
    pub fn from_parameters(params: Vec<OutputParameter>) -> Result<Self> {
        let children = params
            .into_iter()
            .map(|param| {
                check_element_name(&param.name)?;
                let text = match param.value {
                    Value::Stream(mut stream) if param.data_type.is_clob() => stream.read_to_string()?,
                    other => other.to_string(),
                };
                Ok(Element::new(param.name, text))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: ROOT_ELEMENT.to_string(),
            text: String::new(),
            children,
        })
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// XML text without a declaration, indented by two spaces.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_xml(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(Error::encoding)
    }

    fn write_xml(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        check_element_name(&self.name)?;
        if self.text.is_empty() && self.children.is_empty() {
            return writer
                .write_event(Event::Empty(BytesStart::new(self.name.as_str())))
                .map_err(Error::encoding);
        }
        writer
            .write_event(Event::Start(BytesStart::new(self.name.as_str())))
            .map_err(Error::encoding)?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(Error::encoding)?;
        }
        for child in &self.children {
            child.write_xml(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(Error::encoding)
    }

    /// Compact JSON object of the children, omitting the root.
    ///
    /// Leaf children become string properties; nested children become
    /// nested objects.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.children_to_json())?)
    }

    fn children_to_json(&self) -> serde_json::Value {
        let map = self
            .children
            .iter()
            .map(|child| {
                let value = if child.children.is_empty() {
                    serde_json::Value::String(child.text.clone())
                } else {
                    child.children_to_json()
                };
                (child.name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}
