// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{AttrMap, NcName, NcNameStr, Namespace};

use crate::token::Token;
use crate::{Error, TokenReader};

/// A function from one token stream to another.
///
/// Transformers compose by nesting: `b.transform(a.transform(reader))`
/// applies `a` first.
pub trait Transformer {
    /// Wrap `reader`, producing a new stream.
    fn transform(self: Box<Self>, reader: Box<dyn TokenReader>) -> Box<dyn TokenReader>;
}

/// `Insert(name, marshaler)`: for every element in the input whose
/// start-element name matches `name`, splice the token stream produced by
/// `marshaler` in immediately after that start-element.
pub struct Insert<M> {
    name: (Namespace, NcName),
    marshaler: M,
}

/// Construct an [`Insert`] transformer.
pub fn insert<M>(name: (Namespace, NcName), marshaler: M) -> Insert<M>
where
    M: Fn() -> Box<dyn TokenReader> + 'static,
{
    Insert { name, marshaler }
}

impl<M> Transformer for Insert<M>
where
    M: Fn() -> Box<dyn TokenReader> + 'static,
{
    fn transform(self: Box<Self>, reader: Box<dyn TokenReader>) -> Box<dyn TokenReader> {
        Box::new(InsertReader {
            inner: reader,
            name: self.name,
            marshaler: self.marshaler,
            pending: None,
        })
    }
}

struct InsertReader<M> {
    inner: Box<dyn TokenReader>,
    name: (Namespace, NcName),
    marshaler: M,
    pending: Option<Box<dyn TokenReader>>,
}

impl<M: Fn() -> Box<dyn TokenReader>> TokenReader for InsertReader<M> {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        if let Some(pending) = self.pending.as_mut() {
            match pending.read_token()? {
                Some(token) => return Ok(Some(token)),
                None => self.pending = None,
            }
        }
        match self.inner.read_token()? {
            Some(Token::StartElement(start)) => {
                if start.ns == self.name.0 && start.name == self.name.1 {
                    self.pending = Some((self.marshaler)());
                }
                Ok(Some(Token::StartElement(start)))
            }
            other => Ok(other),
        }
    }
}

/// `RemoveAttr(predicate)`: filter attributes on pass-through
/// start-elements, dropping any for which `predicate` returns `true`.
pub struct RemoveAttr<F> {
    predicate: F,
}

/// Construct a [`RemoveAttr`] transformer.
pub fn remove_attr<F>(predicate: F) -> RemoveAttr<F>
where
    F: Fn(&Namespace, &NcNameStr) -> bool + 'static,
{
    RemoveAttr { predicate }
}

impl<F> Transformer for RemoveAttr<F>
where
    F: Fn(&Namespace, &NcNameStr) -> bool + 'static,
{
    fn transform(self: Box<Self>, reader: Box<dyn TokenReader>) -> Box<dyn TokenReader> {
        Box::new(RemoveAttrReader {
            inner: reader,
            predicate: self.predicate,
        })
    }
}

struct RemoveAttrReader<F> {
    inner: Box<dyn TokenReader>,
    predicate: F,
}

impl<F: Fn(&Namespace, &NcNameStr) -> bool> TokenReader for RemoveAttrReader<F> {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        match self.inner.read_token()? {
            Some(Token::StartElement(mut start)) => {
                let kept: Vec<_> = start
                    .attrs
                    .into_iter()
                    .filter(|((ns, name), _)| !(self.predicate)(ns, name))
                    .collect();
                let mut attrs = AttrMap::new();
                for ((ns, name), value) in kept {
                    attrs.insert(ns, name, value);
                }
                start.attrs = attrs;
                Ok(Some(Token::StartElement(start)))
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::StartElement;
    use crate::{single, wrap};

    fn ncname(s: &'static str) -> rxml::NcName {
        rxml::NcName::try_from(s).unwrap()
    }

    struct VecReader(std::vec::IntoIter<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, Error> {
            Ok(self.0.next())
        }
    }

    #[test]
    fn insert_splices_after_matching_start() {
        let reader: Box<dyn TokenReader> = Box::new(wrap(
            VecReader(vec![].into_iter()),
            StartElement::new(Namespace::NONE, ncname("target")),
        ));
        let xf = Box::new(insert((Namespace::NONE, ncname("target")), || {
            Box::new(single(Token::Text("inserted".into()))) as Box<dyn TokenReader>
        }));
        let mut out = xf.transform(reader);
        assert!(matches!(out.read_token().unwrap(), Some(Token::StartElement(_))));
        assert_eq!(out.read_token().unwrap(), Some(Token::Text("inserted".into())));
        assert_eq!(out.read_token().unwrap(), Some(Token::EndElement));
        assert_eq!(out.read_token().unwrap(), None);
    }

    #[test]
    fn remove_attr_filters_by_predicate() {
        let start = StartElement::new(Namespace::NONE, ncname("elem"))
            .with_attr(Namespace::NONE, ncname("keep"), "1")
            .with_attr(Namespace::NONE, ncname("drop"), "2");
        let reader: Box<dyn TokenReader> =
            Box::new(VecReader(vec![Token::StartElement(start)].into_iter()));
        let xf = Box::new(remove_attr(|_ns, name| &**name == "drop"));
        let mut out = xf.transform(reader);
        match out.read_token().unwrap() {
            Some(Token::StartElement(start)) => {
                assert!(start.attrs.get(Namespace::NONE, "keep").is_some());
                assert!(start.attrs.get(Namespace::NONE, "drop").is_none());
            }
            other => panic!("unexpected token: {other:?}"),
        }
    }
}
