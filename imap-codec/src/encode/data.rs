use imap_types::body::{BasicFields, BodyStructure, Disposition, Extension, SpecificFields};
use imap_types::envelope::{Address, Envelope};
use imap_types::fetch::{BodyKind, FetchAttributeValue, SectionPart};
use imap_types::mailbox::MailboxAttribute;
use imap_types::response::Data;
use imap_types::status::StatusAttributeValue;

use super::{Encode, Encoder};

impl Encode for Data {
    fn encode(&self, enc: &mut Encoder) {
        enc.star().sp();
        match self {
            Data::Capability(caps) => {
                enc.atom("CAPABILITY");
                for cap in caps {
                    enc.sp().atom(cap);
                }
            }
            Data::Exists(n) => {
                enc.number(*n).sp().atom("EXISTS");
            }
            Data::Recent(n) => {
                enc.number(*n).sp().atom("RECENT");
            }
            Data::Flags(flags) => {
                enc.atom("FLAGS").sp().flags(flags);
            }
            Data::List {
                attributes,
                delimiter,
                mailbox,
            } => encode_list_like(enc, "LIST", attributes, *delimiter, mailbox.as_str()),
            Data::Lsub {
                attributes,
                delimiter,
                mailbox,
            } => encode_list_like(enc, "LSUB", attributes, *delimiter, mailbox.as_str()),
            Data::Status { mailbox, attributes } => {
                enc.atom("STATUS").sp().quoted_or_literal(mailbox.as_str()).sp();
                enc.begin_list();
                for (i, attr) in attributes.iter().enumerate() {
                    if i > 0 {
                        enc.sp();
                    }
                    encode_status_attribute_value(enc, attr);
                }
                enc.end_list();
            }
            Data::Search(nums) => {
                enc.atom("SEARCH");
                for n in nums {
                    enc.sp().number(*n);
                }
            }
            Data::Esearch(result) => {
                enc.atom("ESEARCH").sp().begin_list().atom("TAG").sp();
                enc.quoted_str(&result.tag);
                enc.end_list();
                if result.uid {
                    enc.sp().atom("UID");
                }
                if let Some(min) = result.min {
                    enc.sp().atom("MIN").sp().number(min);
                }
                if let Some(max) = result.max {
                    enc.sp().atom("MAX").sp().number(max);
                }
                if let Some(count) = result.count {
                    enc.sp().atom("COUNT").sp().number(count);
                }
                if let Some(all) = &result.all {
                    enc.sp().atom("ALL").sp().atom(all);
                }
                if let Some(modseq) = result.mod_seq {
                    enc.sp().atom("MODSEQ").sp().number(modseq);
                }
            }
            Data::Ok { code, text } => {
                enc.atom("OK").sp();
                if let Some(code) = code {
                    enc.raw(b"[");
                    Encode::encode(code, enc);
                    enc.raw(b"] ");
                }
                enc.atom(text);
            }
            Data::Fetch(item) => {
                enc.number(item.seq_or_uid).sp().atom("FETCH").sp();
                enc.list(&item.attributes, encode_fetch_attribute_value);
            }
            Data::UidFetch(item) => {
                enc.number(item.seq_or_uid).sp().atom("UIDFETCH").sp();
                enc.list(&item.attributes, encode_fetch_attribute_value);
            }
            Data::Expunge(n) => {
                enc.number(*n).sp().atom("EXPUNGE");
            }
            Data::Vanished { earlier, uids } => {
                enc.atom("VANISHED");
                if *earlier {
                    enc.sp().atom("(EARLIER)");
                }
                enc.sp().atom(&uids.to_canonical_string());
            }
            Data::Enabled(caps) => {
                enc.atom("ENABLED");
                for cap in caps {
                    enc.sp().atom(cap);
                }
            }
            Data::Bye { code, text } => {
                enc.atom("BYE").sp();
                if let Some(code) = code {
                    enc.raw(b"[");
                    Encode::encode(code, enc);
                    enc.raw(b"] ");
                }
                enc.atom(text);
            }
            Data::Id(params) => {
                enc.atom("ID").sp();
                if params.is_empty() {
                    enc.nil();
                } else {
                    enc.begin_list();
                    for (i, (k, v)) in params.iter().enumerate() {
                        if i > 0 {
                            enc.sp();
                        }
                        enc.quoted_str(k).sp();
                        match v {
                            Some(value) => enc.quoted_str(value),
                            None => enc.nil(),
                        };
                    }
                    enc.end_list();
                }
            }
        }
        enc.crlf();
    }
}

fn encode_list_like(
    enc: &mut Encoder,
    name: &str,
    attributes: &[MailboxAttribute],
    delimiter: Option<char>,
    mailbox: &str,
) {
    enc.atom(name).sp();
    enc.list(attributes, |enc, a| {
        enc.atom(&a.to_string());
    });
    enc.sp();
    match delimiter {
        Some(d) => enc.quoted_str(&d.to_string()),
        None => enc.nil(),
    };
    enc.sp().quoted_or_literal(mailbox);
}

fn encode_status_attribute_value(enc: &mut Encoder, value: &StatusAttributeValue) {
    use StatusAttributeValue::*;
    match value {
        Messages(n) => {
            enc.atom("MESSAGES").sp().number(*n);
        }
        Recent(n) => {
            enc.atom("RECENT").sp().number(*n);
        }
        UidNext(n) => {
            enc.atom("UIDNEXT").sp().number(*n);
        }
        UidValidity(n) => {
            enc.atom("UIDVALIDITY").sp().number(*n);
        }
        Unseen(n) => {
            enc.atom("UNSEEN").sp().number(*n);
        }
        HighestModSeq(n) => {
            enc.atom("HIGHESTMODSEQ").sp().number(*n);
        }
        Size(n) => {
            enc.atom("SIZE").sp().number(*n);
        }
        MailboxId(id) => {
            enc.atom("MAILBOXID").sp().begin_list().atom(id).end_list();
        }
    }
}

fn section_part_str(section: &SectionPart) -> String {
    match section {
        SectionPart::Full => String::new(),
        SectionPart::Header => "HEADER".to_string(),
        SectionPart::HeaderFields(fields) => {
            format!("HEADER.FIELDS ({})", fields.join(" "))
        }
        SectionPart::HeaderFieldsNot(fields) => {
            format!("HEADER.FIELDS.NOT ({})", fields.join(" "))
        }
        SectionPart::Text => "TEXT".to_string(),
        SectionPart::Mime => "MIME".to_string(),
        SectionPart::Part(path, tail) => {
            let path = path
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(".");
            match tail {
                Some(tail) => format!("{path}.{}", section_part_str(tail)),
                None => path,
            }
        }
    }
}

fn encode_fetch_attribute_value(enc: &mut Encoder, value: &FetchAttributeValue) {
    match value {
        FetchAttributeValue::Envelope(env) => {
            enc.atom("ENVELOPE").sp();
            encode_envelope(enc, env);
        }
        FetchAttributeValue::Flags(flags) => {
            enc.atom("FLAGS").sp().flags(flags);
        }
        FetchAttributeValue::InternalDate(dt) => {
            enc.atom("INTERNALDATE").sp();
            enc.quoted_str(&dt.0.format("%d-%b-%Y %H:%M:%S %z").to_string());
        }
        FetchAttributeValue::RFC822Size(n) => {
            enc.atom("RFC822.SIZE").sp().number(*n);
        }
        FetchAttributeValue::Uid(n) => {
            enc.atom("UID").sp().number(*n);
        }
        FetchAttributeValue::BodyStructure(bs) => {
            enc.atom("BODYSTRUCTURE").sp();
            encode_body_structure(enc, bs);
        }
        FetchAttributeValue::Section {
            kind,
            section,
            origin,
            data,
        } => {
            let name = match kind {
                BodyKind::Body => "BODY",
                BodyKind::BodyPeek => "BODY",
                BodyKind::Binary => "BINARY",
                BodyKind::BinaryPeek => "BINARY",
                BodyKind::BinarySize => "BINARY.SIZE",
            };
            enc.atom(name).raw(b"[").atom(&section_part_str(section)).raw(b"]");
            if let Some(origin) = origin {
                enc.raw(b"<").number(*origin).raw(b">");
            }
            enc.sp();
            if matches!(kind, BodyKind::BinarySize) {
                enc.number(data.as_str().map(str::len).unwrap_or(0));
            } else {
                enc.nstring(data);
            }
        }
        FetchAttributeValue::ModSeq(n) => {
            enc.atom("MODSEQ").sp().begin_list().number(*n).end_list();
        }
    }
}

fn encode_address(enc: &mut Encoder, addr: &Address) {
    enc.begin_list();
    enc.nstring(&addr.name).sp();
    enc.nstring(&addr.adl).sp();
    enc.nstring(&addr.mailbox).sp();
    enc.nstring(&addr.host);
    enc.end_list();
}

fn encode_address_list(enc: &mut Encoder, addrs: &[Address]) {
    if addrs.is_empty() {
        enc.nil();
    } else {
        enc.begin_list();
        for (i, a) in addrs.iter().enumerate() {
            if i > 0 {
                enc.sp();
            }
            encode_address(enc, a);
        }
        enc.end_list();
    }
}

pub(crate) fn encode_envelope(enc: &mut Encoder, env: &Envelope) {
    enc.begin_list();
    enc.nstring(&env.date).sp();
    enc.nstring(&env.subject).sp();
    encode_address_list(enc, &env.from);
    enc.sp();
    encode_address_list(enc, &env.sender);
    enc.sp();
    encode_address_list(enc, &env.reply_to);
    enc.sp();
    encode_address_list(enc, &env.to);
    enc.sp();
    encode_address_list(enc, &env.cc);
    enc.sp();
    encode_address_list(enc, &env.bcc);
    enc.sp();
    enc.nstring(&env.in_reply_to).sp();
    enc.nstring(&env.message_id);
    enc.end_list();
}

fn encode_parameters(enc: &mut Encoder, parameters: &[(String, String)]) {
    if parameters.is_empty() {
        enc.nil();
        return;
    }
    enc.begin_list();
    for (i, (k, v)) in parameters.iter().enumerate() {
        if i > 0 {
            enc.sp();
        }
        enc.quoted_or_literal(k).sp().quoted_or_literal(v);
    }
    enc.end_list();
}

fn encode_basic_fields(enc: &mut Encoder, fields: &BasicFields) {
    encode_parameters(enc, &fields.parameters);
    enc.sp();
    enc.nstring(&fields.id).sp();
    enc.nstring(&fields.description).sp();
    enc.quoted_or_literal(&fields.content_transfer_encoding).sp();
    enc.number(fields.size);
}

fn encode_disposition(enc: &mut Encoder, disposition: &Option<Disposition>) {
    match disposition {
        None => {
            enc.nil();
        }
        Some(d) => {
            enc.begin_list();
            enc.quoted_or_literal(&d.disposition_type).sp();
            encode_parameters(enc, &d.parameters);
            enc.end_list();
        }
    }
}

fn encode_extension(enc: &mut Encoder, ext: &Option<Extension>) {
    let Some(ext) = ext else { return };
    enc.sp();
    enc.nstring(&ext.md5).sp();
    encode_disposition(enc, &ext.disposition);
    enc.sp();
    if ext.language.is_empty() {
        enc.nil();
    } else {
        enc.list(&ext.language, |enc, lang| {
            enc.quoted_or_literal(lang);
        });
    }
    enc.sp();
    enc.nstring(&ext.location);
}

pub(crate) fn encode_body_structure(enc: &mut Encoder, bs: &BodyStructure) {
    enc.begin_list();
    match bs {
        BodyStructure::Single(part) => {
            enc.quoted_or_literal(&part.media_type).sp();
            enc.quoted_or_literal(&part.media_subtype).sp();
            encode_basic_fields(enc, &part.basic_fields);
            match &part.specific_fields {
                SpecificFields::Message {
                    envelope,
                    body_structure,
                    number_of_lines,
                } => {
                    enc.sp();
                    encode_envelope(enc, envelope);
                    enc.sp();
                    encode_body_structure(enc, body_structure);
                    enc.sp().number(*number_of_lines);
                }
                SpecificFields::Text { number_of_lines } => {
                    enc.sp().number(*number_of_lines);
                }
                SpecificFields::Basic => {}
            }
            encode_extension(enc, &part.extension);
        }
        BodyStructure::Multi {
            parts,
            media_subtype,
            extension,
        } => {
            for part in parts {
                encode_body_structure(enc, part);
            }
            enc.sp().quoted_or_literal(media_subtype);
            if let Some(ext) = extension {
                enc.sp();
                encode_parameters(enc, &ext.parameters);
                enc.sp();
                encode_disposition(enc, &ext.disposition);
                enc.sp();
                if ext.language.is_empty() {
                    enc.nil();
                } else {
                    enc.list(&ext.language, |enc, lang| {
                        enc.quoted_or_literal(lang);
                    });
                }
                enc.sp();
                enc.nstring(&ext.location);
            }
        }
    }
    enc.end_list();
}
