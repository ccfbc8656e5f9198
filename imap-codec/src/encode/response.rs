use imap_types::response::{Code, Continuation, Greeting, StatusKind, StatusResponse};

use super::{Encode, Encoder};

impl Encode for Code {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Code::Capability(caps) => {
                enc.atom("CAPABILITY");
                for cap in caps {
                    enc.sp().atom(cap);
                }
            }
            Code::ReadOnly => {
                enc.atom("READ-ONLY");
            }
            Code::ReadWrite => {
                enc.atom("READ-WRITE");
            }
            Code::UidValidity(v) => {
                enc.atom("UIDVALIDITY").sp().number(*v);
            }
            Code::UidNext(v) => {
                enc.atom("UIDNEXT").sp().number(*v);
            }
            Code::PermanentFlags(flags) => {
                enc.atom("PERMANENTFLAGS").sp();
                enc.list(flags, |enc, f| {
                    enc.atom(&f.to_string());
                });
            }
            Code::Unseen(v) => {
                enc.atom("UNSEEN").sp().number(*v);
            }
            Code::HighestModSeq(v) => {
                enc.atom("HIGHESTMODSEQ").sp().number(*v);
            }
            Code::MailboxId(id) => {
                enc.atom("MAILBOXID").sp().begin_list().atom(id).end_list();
            }
            Code::AppendUid { uid_validity, uids } => {
                enc.atom("APPENDUID").sp().number(*uid_validity).sp();
                let joined = uids
                    .iter()
                    .map(|u| u.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                enc.atom(&joined);
            }
            Code::CopyUid {
                uid_validity,
                source,
                destination,
            } => {
                enc.atom("COPYUID")
                    .sp()
                    .number(*uid_validity)
                    .sp()
                    .atom(&source.to_canonical_string())
                    .sp()
                    .atom(&destination.to_canonical_string());
            }
            Code::UidRequired => {
                enc.atom("UIDREQUIRED");
            }
            Code::Modified(set) => {
                enc.atom("MODIFIED").sp().atom(set);
            }
            Code::TryCreate => {
                enc.atom("TRYCREATE");
            }
            Code::AlreadyExists => {
                enc.atom("ALREADYEXISTS");
            }
            Code::NonExistent => {
                enc.atom("NONEXISTENT");
            }
            Code::ClientBug => {
                enc.atom("CLIENTBUG");
            }
            Code::ServerBug => {
                enc.atom("SERVERBUG");
            }
            Code::Other(name, Some(value)) => {
                enc.atom(name).sp().atom(value);
            }
            Code::Other(name, None) => {
                enc.atom(name);
            }
        }
    }
}

fn status_kind_atom(kind: StatusKind) -> &'static str {
    match kind {
        StatusKind::Ok => "OK",
        StatusKind::No => "NO",
        StatusKind::Bad => "BAD",
        StatusKind::PreAuth => "PREAUTH",
        StatusKind::Bye => "BYE",
    }
}

impl Encode for StatusResponse {
    fn encode(&self, enc: &mut Encoder) {
        match &self.tag {
            Some(tag) => enc.atom(tag.as_str()),
            None => enc.star(),
        };
        enc.sp().atom(status_kind_atom(self.kind)).sp();
        if let Some(code) = &self.code {
            enc.raw(b"[");
            code.encode(enc);
            enc.raw(b"] ");
        }
        enc.atom(&self.text).crlf();
    }
}

impl Encode for Greeting {
    fn encode(&self, enc: &mut Encoder) {
        enc.star().sp().atom(status_kind_atom(self.kind)).sp();
        if let Some(code) = &self.code {
            enc.raw(b"[");
            code.encode(enc);
            enc.raw(b"] ");
        }
        enc.atom(&self.text).crlf();
    }
}

impl Encode for Continuation {
    fn encode(&self, enc: &mut Encoder) {
        enc.raw(b"+ ").atom(&self.0).crlf();
    }
}
