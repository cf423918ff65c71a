//! XEP-0004: Data Forms.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use xmlstream::{single, wrap, Iter, StartElement, Token, TokenReader};

use crate::{ActiveChild, ChainAll, Error};

fn ns_data_forms() -> Namespace {
    Namespace::from(stanza::ns::DATA_FORMS)
}

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn invalid(name: &'static str, value: &str) -> Error {
    Error::Stanza(stanza::Error::InvalidAttribute(name, value.to_string()))
}

/// The `type` attribute of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `boolean`
    Boolean,
    /// `fixed`: read-only descriptive text, never submitted back.
    Fixed,
    /// `hidden`: not shown to the user, but submitted back.
    Hidden,
    /// `jid-multi`
    JidMulti,
    /// `jid-single`
    JidSingle,
    /// `list-multi`
    ListMulti,
    /// `list-single`
    ListSingle,
    /// `text-multi`
    TextMulti,
    /// `text-private`: a password-style single line.
    TextPrivate,
    /// `text-single`
    TextSingle,
}

impl FieldType {
    fn as_str(self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Fixed => "fixed",
            FieldType::Hidden => "hidden",
            FieldType::JidMulti => "jid-multi",
            FieldType::JidSingle => "jid-single",
            FieldType::ListMulti => "list-multi",
            FieldType::ListSingle => "list-single",
            FieldType::TextMulti => "text-multi",
            FieldType::TextPrivate => "text-private",
            FieldType::TextSingle => "text-single",
        }
    }

    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("boolean") => FieldType::Boolean,
            Some("fixed") => FieldType::Fixed,
            Some("hidden") => FieldType::Hidden,
            Some("jid-multi") => FieldType::JidMulti,
            Some("jid-single") => FieldType::JidSingle,
            Some("list-multi") => FieldType::ListMulti,
            Some("list-single") => FieldType::ListSingle,
            Some("text-multi") => FieldType::TextMulti,
            Some("text-private") => FieldType::TextPrivate,
            _ => FieldType::TextSingle,
        }
    }
}

/// A single `<field/>` of a [`DataForm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The field's unique identifier within the form. `None` only for a
    /// `fixed` field used as section text.
    pub var: Option<String>,
    /// The field's type, defaulting to `text-single` when unspecified.
    pub type_: FieldType,
    /// A label to display to the user.
    pub label: Option<String>,
    /// The field's value(s); more than one only makes sense for the
    /// `*-multi` types.
    pub values: Vec<String>,
}

impl Field {
    /// Build an empty field of the given var and type.
    pub fn new(var: impl Into<String>, type_: FieldType) -> Self {
        Field {
            var: Some(var.into()),
            type_,
            label: None,
            values: Vec::new(),
        }
    }

    /// Append a value, returning `self` for chaining.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Build a `text-single` field with one value.
    pub fn text_single(var: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(var, FieldType::TextSingle).with_value(value)
    }

    /// The field's first (and, for non-multi types, only) value.
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    fn to_reader(&self) -> Box<dyn TokenReader + Send> {
        let mut start = StartElement::new(ns_data_forms(), ncname("field"));
        if let Some(var) = &self.var {
            start = start.with_attr(Namespace::NONE, ncname("var"), var.clone());
        }
        start = start.with_attr(Namespace::NONE, ncname("type"), self.type_.as_str());
        if let Some(label) = &self.label {
            start = start.with_attr(Namespace::NONE, ncname("label"), label.clone());
        }
        let values: Vec<Box<dyn TokenReader + Send>> = self
            .values
            .iter()
            .map(|v| {
                Box::new(wrap(
                    single(Token::Text(v.clone())),
                    StartElement::new(ns_data_forms(), ncname("value")),
                )) as Box<dyn TokenReader + Send>
            })
            .collect();
        Box::new(wrap(ChainAll::new(values), start))
    }

    fn parse<R: TokenReader>(start: &StartElement, mut children: Iter<R>) -> Result<Self, Error> {
        let var = start.attrs.get(Namespace::NONE, "var").map(str::to_string);
        let type_ = FieldType::parse(start.attrs.get(Namespace::NONE, "type"));
        let label = start.attrs.get(Namespace::NONE, "label").map(str::to_string);
        let mut values = Vec::new();

        while let Some(child) = children.next_child()? {
            if &*child.name == "value" {
                let mut text = String::new();
                while let Some(token) = children.child_token()? {
                    if let Token::Text(t) = token {
                        text.push_str(&t);
                    }
                }
                values.push(text);
            } else {
                while children.child_token()?.is_some() {}
            }
        }

        Ok(Field {
            var,
            type_,
            label,
            values,
        })
    }
}

/// The `type` attribute of a [`DataForm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormType {
    /// A request for the recipient to fill in and return as `submit`.
    Form,
    /// A completed response to a `form`-typed form.
    Submit,
    /// Cancels a prior `form`-typed request.
    Cancel,
    /// The result of a search or similar query.
    Result_,
}

impl DataFormType {
    fn as_str(self) -> &'static str {
        match self {
            DataFormType::Form => "form",
            DataFormType::Submit => "submit",
            DataFormType::Cancel => "cancel",
            DataFormType::Result_ => "result",
        }
    }

    fn parse(s: Option<&str>) -> Result<Self, Error> {
        match s {
            Some("form") => Ok(DataFormType::Form),
            Some("submit") => Ok(DataFormType::Submit),
            Some("cancel") => Ok(DataFormType::Cancel),
            Some("result") => Ok(DataFormType::Result_),
            other => Err(invalid("type", other.unwrap_or(""))),
        }
    }
}

/// A `<x xmlns="jabber:x:data"/>` form, either presented for filling
/// (`form`), submitted back (`submit`), returned as a query result
/// (`result`), or cancelling a prior request (`cancel`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataForm {
    /// What this form instance represents.
    pub type_: DataFormType,
    /// The form's `FORM_TYPE`, a hidden field identifying its schema
    /// (XEP-0068), kept out of [`DataForm::fields`] like the reference
    /// XEP-0004 model does.
    pub form_type: Option<String>,
    /// A human-readable title.
    pub title: Option<String>,
    /// Human-readable instructions for filling the form.
    pub instructions: Option<String>,
    /// The form's fields, excluding `FORM_TYPE`.
    pub fields: Vec<Field>,
}

impl DataForm {
    /// Build an empty form of the given type and schema.
    pub fn new(type_: DataFormType, form_type: impl Into<String>) -> Self {
        DataForm {
            type_,
            form_type: Some(form_type.into()),
            title: None,
            instructions: None,
            fields: Vec::new(),
        }
    }

    /// Look up a field by its `var`.
    pub fn field(&self, var: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.var.as_deref() == Some(var))
    }

    /// Append a field, returning `self` for chaining.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Build the token stream for this form's `<x xmlns="jabber:x:data"/>`
    /// element.
    pub fn to_reader(&self) -> Box<dyn TokenReader + Send> {
        let start = StartElement::new(ns_data_forms(), ncname("x"))
            .with_attr(Namespace::NONE, ncname("type"), self.type_.as_str());

        let mut children: Vec<Box<dyn TokenReader + Send>> = Vec::new();
        if let Some(title) = &self.title {
            children.push(Box::new(wrap(
                single(Token::Text(title.clone())),
                StartElement::new(ns_data_forms(), ncname("title")),
            )));
        }
        if let Some(instructions) = &self.instructions {
            children.push(Box::new(wrap(
                single(Token::Text(instructions.clone())),
                StartElement::new(ns_data_forms(), ncname("instructions")),
            )));
        }
        if let Some(form_type) = &self.form_type {
            let hidden = Field::new("FORM_TYPE", FieldType::Hidden).with_value(form_type.clone());
            children.push(hidden.to_reader());
        }
        for field in &self.fields {
            children.push(field.to_reader());
        }

        Box::new(wrap(ChainAll::new(children), start))
    }

    /// Decode a `DataForm` from an already-consumed `<x xmlns="jabber:x:data"/>`
    /// start-element and its children.
    pub fn parse<R: TokenReader>(start: &StartElement, mut children: Iter<R>) -> Result<Self, Error> {
        if &*start.ns != stanza::ns::DATA_FORMS || &*start.name != "x" {
            return Err(Error::UnexpectedElement);
        }
        let type_ = DataFormType::parse(start.attrs.get(Namespace::NONE, "type"))?;

        let mut title = None;
        let mut instructions = None;
        let mut form_type = None;
        let mut fields = Vec::new();

        while let Some(child) = children.next_child()? {
            match &*child.name {
                "title" if title.is_none() => {
                    let mut text = String::new();
                    while let Some(token) = children.child_token()? {
                        if let Token::Text(t) = token {
                            text.push_str(&t);
                        }
                    }
                    title = Some(text);
                }
                "instructions" if instructions.is_none() => {
                    let mut text = String::new();
                    while let Some(token) = children.child_token()? {
                        if let Token::Text(t) = token {
                            text.push_str(&t);
                        }
                    }
                    instructions = Some(text);
                }
                "field" => {
                    let field_children = xmlstream::iter_children(ActiveChild(&mut children));
                    let field = Field::parse(&child, field_children)?;
                    if field.var.as_deref() == Some("FORM_TYPE") {
                        form_type = field.values.into_iter().next();
                    } else {
                        fields.push(field);
                    }
                }
                _ => {
                    while children.child_token()?.is_some() {}
                }
            }
        }

        Ok(DataForm {
            type_,
            form_type,
            title,
            instructions,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct VecReader(VecDeque<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    #[test]
    fn parses_form_type_and_fields() {
        let x_start = StartElement::new(ns_data_forms(), ncname("x"))
            .with_attr(Namespace::NONE, ncname("type"), "submit");
        let form_type_field = StartElement::new(ns_data_forms(), ncname("field"))
            .with_attr(Namespace::NONE, ncname("var"), "FORM_TYPE");
        let value_start = StartElement::new(ns_data_forms(), ncname("value"));
        let name_field = StartElement::new(ns_data_forms(), ncname("field"))
            .with_attr(Namespace::NONE, ncname("var"), "muc#roomconfig_roomname")
            .with_attr(Namespace::NONE, ncname("type"), "text-single");

        let tokens: VecDeque<Token> = vec![
            Token::StartElement(form_type_field),
            Token::StartElement(value_start.clone()),
            Token::Text("http://jabber.org/protocol/muc#roomconfig".into()),
            Token::EndElement, // closes value
            Token::EndElement, // closes field
            Token::StartElement(name_field),
            Token::StartElement(value_start),
            Token::Text("My Room".into()),
            Token::EndElement, // closes value
            Token::EndElement, // closes field
            Token::EndElement, // closes x
        ]
        .into();
        let children = xmlstream::iter_children(VecReader(tokens));

        let form = DataForm::parse(&x_start, children).unwrap();
        assert_eq!(form.type_, DataFormType::Submit);
        assert_eq!(
            form.form_type.as_deref(),
            Some("http://jabber.org/protocol/muc#roomconfig")
        );
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.field("muc#roomconfig_roomname").and_then(Field::value), Some("My Room"));
    }

    #[test]
    fn rejects_non_form_element() {
        let start = StartElement::new(Namespace::NONE, ncname("bogus"));
        let children = xmlstream::iter_children(VecReader(VecDeque::new()));
        assert!(matches!(DataForm::parse(&start, children), Err(Error::UnexpectedElement)));
    }
}
