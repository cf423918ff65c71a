//! XEP-0045 §10.2: room configuration, via `http://jabber.org/protocol/muc#owner`.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use jid::Jid;
use session::{IqResponse, Session};
use stanza::{Iq, IqType};
use xmlstream::{wrap, StartElement, TokenReader};

use crate::forms::DataForm;
use crate::{stamp_iq, ActiveChild, Empty, Error};

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn query_name() -> (Namespace, NcName) {
    (Namespace::from(stanza::ns::MUC_OWNER), ncname("query"))
}

/// Fetch `room`'s configuration form, to be filled in and returned via
/// [`set_config`].
pub async fn get_config(session: &dyn Session, room: &Jid) -> Result<DataForm, Error> {
    let (ns, name) = query_name();
    let payload = wrap(Empty, StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: IqType::Get,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, Some(room.clone())).await? {
        IqResponse::Result(reader) => {
            let mut top = xmlstream::iter_children(reader);
            let _query_start = top.next_child()?.ok_or(stanza::Error::UnexpectedElement)?;
            let mut query_children = xmlstream::iter_children(ActiveChild(&mut top));
            let form_start = query_children
                .next_child()?
                .ok_or(stanza::Error::UnexpectedElement)?;
            let form_children = xmlstream::iter_children(ActiveChild(&mut query_children));
            let form = DataForm::parse(&form_start, form_children)?;
            while query_children.next_child()?.is_some() {}
            Ok(form)
        }
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

/// Submit a completed (or cancelled) configuration form back to `room`.
pub async fn set_config(session: &dyn Session, room: &Jid, form: DataForm) -> Result<(), Error> {
    let (ns, name) = query_name();
    let payload = wrap(form.to_reader(), StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: IqType::Set,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, Some(room.clone())).await? {
        IqResponse::Result(_) => Ok(()),
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

/// Permanently destroy `room`.
pub async fn destroy(
    session: &dyn Session,
    room: &Jid,
    reason: Option<&str>,
    alternate: Option<&Jid>,
) -> Result<(), Error> {
    use xmlstream::{single, Token};

    use crate::maybe;

    let mut destroy_start = StartElement::new(Namespace::from(stanza::ns::MUC_OWNER), ncname("destroy"));
    if let Some(alt) = alternate {
        destroy_start = destroy_start.with_attr(Namespace::NONE, ncname("jid"), alt.to_string());
    }
    let reason_part = maybe(reason.map(|r| {
        wrap(
            single(Token::Text(r.to_string())),
            StartElement::new(Namespace::from(stanza::ns::MUC_OWNER), ncname("reason")),
        )
    }));
    let destroy = wrap(reason_part, destroy_start);

    let (ns, name) = query_name();
    let payload = wrap(destroy, StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: IqType::Set,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, Some(room.clone())).await? {
        IqResponse::Result(_) => Ok(()),
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{DataFormType, Field};

    #[test]
    fn set_config_payload_carries_form_and_owner_namespace() {
        let form = DataForm::new(DataFormType::Submit, "http://jabber.org/protocol/muc#roomconfig")
            .with_field(Field::text_single("muc#roomconfig_roomname", "My Room"));
        let (ns, name) = query_name();
        let mut stream = wrap(form.to_reader(), StartElement::new(ns, name));
        let first = stream.read_token().unwrap().unwrap();
        assert!(matches!(first, xmlstream::Token::StartElement(ref s)
            if &*s.name == "query" && &*s.ns == stanza::ns::MUC_OWNER));
    }
}
