// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use crate::token::{StartElement, Token};
use crate::Error;

/// A lazy, single-pass source of [`Token`]s.
///
/// Once `read_token` returns `Ok(None)` or an `Err`, the stream is
/// exhausted; further calls have unspecified behavior and implementations
/// are free to panic.
pub trait TokenReader {
    /// Read the next token, or `None` at the end of the stream.
    fn read_token(&mut self) -> Result<Option<Token>, Error>;
}

impl<R: TokenReader + ?Sized> TokenReader for Box<R> {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        (**self).read_token()
    }
}

impl<'a, R: TokenReader + ?Sized> TokenReader for &'a mut R {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        (**self).read_token()
    }
}

/// A sink that consumes [`Token`]s.
pub trait TokenWriter {
    /// Write a single token.
    fn write_token(&mut self, token: Token) -> Result<(), Error>;
}

impl<W: TokenWriter + ?Sized> TokenWriter for Box<W> {
    fn write_token(&mut self, token: Token) -> Result<(), Error> {
        (**self).write_token(token)
    }
}

/// A single-token stream: the `Token(t)` primitive.
///
/// Yields `t` once, then ends.
pub struct Single(Option<Token>);

/// Construct a [`Single`], a stream that yields exactly one token.
pub fn single(token: Token) -> Single {
    Single(Some(token))
}

impl TokenReader for Single {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        Ok(self.0.take())
    }
}

/// The `Wrap(inner, start)` primitive: emits `start`, then the tokens of
/// `inner`, then `start`'s end-element.
pub struct Wrap<R> {
    start: Option<StartElement>,
    inner: Option<R>,
    end_emitted: bool,
}

/// Wrap `inner` in `start`, producing a full element's worth of tokens.
pub fn wrap<R: TokenReader>(inner: R, start: StartElement) -> Wrap<R> {
    Wrap {
        start: Some(start),
        inner: Some(inner),
        end_emitted: false,
    }
}

impl<R: TokenReader> TokenReader for Wrap<R> {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        if let Some(start) = self.start.take() {
            return Ok(Some(Token::StartElement(start)));
        }
        if let Some(inner) = self.inner.as_mut() {
            match inner.read_token()? {
                Some(token) => return Ok(Some(token)),
                None => self.inner = None,
            }
        }
        if !self.end_emitted {
            self.end_emitted = true;
            return Ok(Some(Token::EndElement));
        }
        Ok(None)
    }
}

/// The `MultiReader(r1, r2, …)` primitive: sequential concatenation of
/// heterogeneous streams.
pub struct MultiReader {
    readers: VecDeque<Box<dyn TokenReader>>,
}

/// Concatenate `readers` into a single sequential stream.
pub fn multi_reader(readers: Vec<Box<dyn TokenReader>>) -> MultiReader {
    MultiReader {
        readers: readers.into(),
    }
}

impl TokenReader for MultiReader {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        while let Some(front) = self.readers.front_mut() {
            match front.read_token()? {
                Some(token) => return Ok(Some(token)),
                None => {
                    self.readers.pop_front();
                }
            }
        }
        Ok(None)
    }
}

/// The `Inner(r)` primitive: reads the content of an element whose
/// start-element has already been consumed, stopping (and returning `None`)
/// at the matching end-element.
pub struct Inner<R> {
    inner: R,
    depth: u32,
    done: bool,
}

/// Limit `reader` to the content of an already-opened element, tracking
/// nesting depth so descendant elements are passed through transparently.
pub fn inner<R: TokenReader>(reader: R) -> Inner<R> {
    Inner {
        inner: reader,
        depth: 0,
        done: false,
    }
}

impl<R: TokenReader> TokenReader for Inner<R> {
    fn read_token(&mut self) -> Result<Option<Token>, Error> {
        if self.done {
            return Ok(None);
        }
        match self.inner.read_token()? {
            Some(Token::StartElement(start)) => {
                self.depth += 1;
                Ok(Some(Token::StartElement(start)))
            }
            Some(Token::EndElement) => {
                if self.depth == 0 {
                    self.done = true;
                    Ok(None)
                } else {
                    self.depth -= 1;
                    Ok(Some(Token::EndElement))
                }
            }
            Some(other) => Ok(Some(other)),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

/// A sink token-writer that discards everything written to it: the
/// `Discard()` primitive.
pub struct Discard;

/// Construct a [`Discard`] sink.
pub fn discard() -> Discard {
    Discard
}

impl TokenWriter for Discard {
    fn write_token(&mut self, _token: Token) -> Result<(), Error> {
        Ok(())
    }
}

/// The `Copy(encoder, reader)` primitive: drain `reader` into `encoder`,
/// returning the number of tokens copied and the first error encountered
/// (from either the read or the write side), if any.
pub fn copy<R, W>(encoder: &mut W, reader: &mut R) -> (u64, Option<Error>)
where
    R: TokenReader + ?Sized,
    W: TokenWriter + ?Sized,
{
    let mut count = 0u64;
    loop {
        let token = match reader.read_token() {
            Ok(Some(token)) => token,
            Ok(None) => return (count, None),
            Err(e) => return (count, Some(e)),
        };
        match encoder.write_token(token) {
            Ok(()) => count += 1,
            Err(e) => return (count, Some(e)),
        }
    }
}

/// Fast-forward `reader` to its end by draining it into a [`Discard`] sink.
pub fn fast_forward<R: TokenReader + ?Sized>(reader: &mut R) -> (u64, Option<Error>) {
    copy(&mut Discard, reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxml::Namespace;

    fn ncname(s: &str) -> rxml::NcName {
        rxml::NcName::try_from(s).unwrap()
    }

    #[test]
    fn wrap_emits_start_inner_end() {
        let mut w = wrap(single(Token::Text("hi".into())), StartElement::new(Namespace::NONE, ncname("a")));
        assert!(matches!(w.read_token().unwrap(), Some(Token::StartElement(_))));
        assert_eq!(w.read_token().unwrap(), Some(Token::Text("hi".into())));
        assert_eq!(w.read_token().unwrap(), Some(Token::EndElement));
        assert_eq!(w.read_token().unwrap(), None);
    }

    #[test]
    fn multi_reader_concatenates() {
        let mut m = multi_reader(vec![
            Box::new(single(Token::Text("a".into()))),
            Box::new(single(Token::Text("b".into()))),
        ]);
        assert_eq!(m.read_token().unwrap(), Some(Token::Text("a".into())));
        assert_eq!(m.read_token().unwrap(), Some(Token::Text("b".into())));
        assert_eq!(m.read_token().unwrap(), None);
    }

    #[test]
    fn inner_stops_at_matching_end() {
        let tokens = vec![
            Token::StartElement(StartElement::new(Namespace::NONE, ncname("child"))),
            Token::EndElement,
            Token::EndElement,
        ];
        let mut it = tokens.into_iter();
        struct VecReader<I>(I);
        impl<I: Iterator<Item = Token>> TokenReader for VecReader<I> {
            fn read_token(&mut self) -> Result<Option<Token>, Error> {
                Ok(self.0.next())
            }
        }
        let mut i = inner(VecReader(&mut it));
        assert!(matches!(i.read_token().unwrap(), Some(Token::StartElement(_))));
        assert_eq!(i.read_token().unwrap(), Some(Token::EndElement));
        assert_eq!(i.read_token().unwrap(), None);
        // the outer end-element was not consumed by `Inner`
        assert_eq!(it.next(), Some(Token::EndElement));
    }

    #[test]
    fn copy_counts_tokens() {
        struct Collector(Vec<Token>);
        impl TokenWriter for Collector {
            fn write_token(&mut self, token: Token) -> Result<(), Error> {
                self.0.push(token);
                Ok(())
            }
        }
        let mut reader = multi_reader(vec![
            Box::new(single(Token::Text("a".into()))),
            Box::new(single(Token::Text("b".into()))),
        ]);
        let mut collector = Collector(Vec::new());
        let (count, err) = copy(&mut collector, &mut reader);
        assert_eq!(count, 2);
        assert!(err.is_none());
        assert_eq!(collector.0.len(), 2);
    }

    #[test]
    fn fast_forward_drains_without_collecting() {
        let mut reader = single(Token::Text("a".into()));
        let (count, err) = fast_forward(&mut reader);
        assert_eq!(count, 1);
        assert!(err.is_none());
    }
}
