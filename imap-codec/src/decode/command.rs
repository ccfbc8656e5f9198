//! The command grammar: everything from `tag SP command-name` through the
//! trailing `CRLF`. By the time any of this runs, the framing layer (see
//! [`crate::framing`]) has already materialized every literal payload the
//! command references, so these parsers run over a complete, in-memory
//! byte slice with `nom::bytes::complete` semantics throughout.

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, map_res, opt, value};
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use imap_types::auth::{AuthMechanism, AuthenticateData};
use imap_types::command::{
    AppendMessage, AppendOptions, Command, CommandBody, ListOptions, NumKind, SeqSetOrUidSet,
    SelectOptions, StoreOptions,
};
use imap_types::core::{AString, Tag};
use imap_types::datetime::DateTime;
use imap_types::fetch::{BodyKind, FetchAttribute, FetchOptions, Macro, MacroOrAttributes, Partial, SectionPart};
use imap_types::flag::{Flag, StoreResponse, StoreType};
use imap_types::mailbox::Mailbox;
use imap_types::search::{ReturnOptions, SearchKey, SearchOptions};
use imap_types::secret::Secret;
use imap_types::sequence::{SeqSet, UidSet};
use imap_types::status::{StatusAttribute, StatusOptions};

use super::primitive::{
    astring, atom, command_tag, crlf, istring, literal, mailbox_name, nstring, number, number64,
    paren_list, quoted, seq_set_token, sp,
};
use crate::error::DecodeError;

/// Decode one complete, CRLF-terminated logical command line (with any
/// literal payloads it references already spliced in at the `{N}`
/// positions).
pub fn decode_command(input: &[u8]) -> Result<Command, DecodeError> {
    match terminated(command, crlf)(input) {
        Ok((rest, cmd)) if rest.is_empty() => Ok(cmd),
        Ok((rest, _)) => Err(DecodeError::Malformed(format!(
            "{} trailing byte(s) after command",
            rest.len()
        ))),
        Err(_) => Err(DecodeError::Malformed("could not parse command".into())),
    }
}

/// `* ...` continuation data sent mid-`AUTHENTICATE` exchange: either `*`
/// (cancel) or a base64 blob, CRLF-terminated. Not part of the tagged
/// command grammar, so it is decoded through its own entry point.
pub fn decode_authenticate_continuation(input: &[u8]) -> Result<AuthenticateData, DecodeError> {
    let parser = alt((
        value(AuthenticateData::Cancel, char('*')),
        map_res(take_while1(|b: u8| b != b'\r' && b != b'\n'), |bytes: &[u8]| {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(bytes)
                .map(|data| AuthenticateData::Response(Secret::new(data)))
                .map_err(|_| "invalid base64 continuation data")
        }),
    ));
    match terminated(parser, crlf)(input) {
        Ok((rest, data)) if rest.is_empty() => Ok(data),
        _ => Err(DecodeError::Malformed("malformed AUTHENTICATE continuation".into())),
    }
}

/// A bare `DONE` line, terminating an `IDLE` (RFC 2177).
pub fn is_idle_done(input: &[u8]) -> bool {
    input.eq_ignore_ascii_case(b"DONE\r\n")
}

fn command(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, tag) = command_tag(input)?;
    let (input, _) = sp(input)?;
    let (input, body) = command_body(input)?;
    Ok((input, Command { tag, body }))
}

fn command_body(input: &[u8]) -> IResult<&[u8], CommandBody> {
    alt((
        alt((
            value(CommandBody::Capability, tag_no_case("CAPABILITY")),
            value(CommandBody::Noop, tag_no_case("NOOP")),
            value(CommandBody::Logout, tag_no_case("LOGOUT")),
            value(CommandBody::StartTls, tag_no_case("STARTTLS")),
            value(CommandBody::Idle, tag_no_case("IDLE")),
            value(CommandBody::Check, tag_no_case("CHECK")),
            value(CommandBody::Close, tag_no_case("CLOSE")),
            value(CommandBody::Unselect, tag_no_case("UNSELECT")),
            id_command,
            authenticate_command,
            login_command,
            enable_command,
        )),
        alt((
            select_command,
            examine_command,
            create_command,
            delete_command,
            rename_command,
            subscribe_command,
            unsubscribe_command,
            list_command,
            lsub_command,
            status_command,
            append_command,
            expunge_command,
        )),
        alt((
            uid_prefixed_command,
            search_command(NumKind::Seq),
            fetch_command(NumKind::Seq),
            store_command(NumKind::Seq),
            copy_command(NumKind::Seq),
            move_command(NumKind::Seq),
        )),
    ))(input)
}

fn id_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    preceded(
        pair(tag_no_case("ID"), sp),
        alt((
            value(Vec::new(), tag_no_case("NIL")),
            paren_list(id_param),
        )),
    )
    .map(|parameters| CommandBody::Id { parameters })
    .parse(input)
}

fn id_param(input: &[u8]) -> IResult<&[u8], (String, Option<String>)> {
    let (input, key) = istring(input)?;
    let (input, _) = sp(input)?;
    let (input, value) = nstring(input)?;
    Ok((
        input,
        (
            key.as_str().unwrap_or_default().to_string(),
            value.as_str().map(str::to_string),
        ),
    ))
}

fn authenticate_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("AUTHENTICATE"), sp)(input)?;
    let (input, mech) = atom(input)?;
    let (input, initial_response) = opt(preceded(sp, base64_token))(input)?;
    Ok((
        input,
        CommandBody::Authenticate {
            mechanism: AuthMechanism::new(mech.as_str()),
            initial_response: initial_response.map(Secret::new),
        },
    ))
}

fn base64_token(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map_res(take_while1(|b: u8| b != b' ' && b != b'\r' && b != b'\n'), |bytes: &[u8]| {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(bytes)
            .map_err(|_| "invalid base64")
    })(input)
}

fn login_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("LOGIN"), sp)(input)?;
    let (input, username) = astring(input)?;
    let (input, _) = sp(input)?;
    let (input, password) = astring(input)?;
    Ok((
        input,
        CommandBody::Login {
            username,
            password: Secret::new(password),
        },
    ))
}

fn enable_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("ENABLE"), sp)(input)?;
    let (input, capabilities) = separated_list1(sp, map(atom, |a| a.as_str().to_string()))(input)?;
    Ok((input, CommandBody::Enable { capabilities }))
}

fn select_options(input: &[u8]) -> IResult<&[u8], SelectOptions> {
    map(
        opt(preceded(sp, delimited(char('('), tag_no_case("CONDSTORE"), char(')')))),
        |condstore| SelectOptions {
            condstore: condstore.is_some(),
        },
    )(input)
}

fn select_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("SELECT"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    let (input, options) = select_options(input)?;
    Ok((
        input,
        CommandBody::Select {
            mailbox: Mailbox::new(mailbox),
            options,
        },
    ))
}

fn examine_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("EXAMINE"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    let (input, options) = select_options(input)?;
    Ok((
        input,
        CommandBody::Examine {
            mailbox: Mailbox::new(mailbox),
            options,
        },
    ))
}

fn create_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("CREATE"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    Ok((input, CommandBody::Create { mailbox: Mailbox::new(mailbox) }))
}

fn delete_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("DELETE"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    Ok((input, CommandBody::Delete { mailbox: Mailbox::new(mailbox) }))
}

fn rename_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("RENAME"), sp)(input)?;
    let (input, from) = mailbox_name(input)?;
    let (input, _) = sp(input)?;
    let (input, to) = mailbox_name(input)?;
    Ok((
        input,
        CommandBody::Rename {
            from: Mailbox::new(from),
            to: Mailbox::new(to),
        },
    ))
}

fn subscribe_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("SUBSCRIBE"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    Ok((input, CommandBody::Subscribe { mailbox: Mailbox::new(mailbox) }))
}

fn unsubscribe_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("UNSUBSCRIBE"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    Ok((input, CommandBody::Unsubscribe { mailbox: Mailbox::new(mailbox) }))
}

fn is_list_char(b: u8) -> bool {
    !matches!(b, b'(' | b')' | b'{' | b' ' | 0..=0x1f | 0x7f | b'"' | b'\\')
}

fn list_mailbox(input: &[u8]) -> IResult<&[u8], String> {
    alt((
        map(quoted, |q| q.as_str().to_string()),
        map(take_while1(is_list_char), |bytes: &[u8]| {
            String::from_utf8_lossy(bytes).into_owned()
        }),
    ))(input)
}

fn list_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("LIST"), sp)(input)?;
    let (input, reference) = mailbox_name(input)?;
    let (input, _) = sp(input)?;
    let (input, pattern) = list_mailbox(input)?;
    let (input, status) = opt(preceded(
        tuple((sp, tag_no_case("RETURN"), sp)),
        paren_list(status_attribute),
    ))(input)?;
    Ok((
        input,
        CommandBody::List {
            reference: Mailbox::new(reference),
            pattern,
            options: ListOptions {
                selection_subscribed: false,
                return_status: status.map(|attributes| StatusOptions { attributes }),
            },
        },
    ))
}

fn lsub_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("LSUB"), sp)(input)?;
    let (input, reference) = mailbox_name(input)?;
    let (input, _) = sp(input)?;
    let (input, pattern) = list_mailbox(input)?;
    Ok((
        input,
        CommandBody::Lsub {
            reference: Mailbox::new(reference),
            pattern,
        },
    ))
}

fn status_attribute(input: &[u8]) -> IResult<&[u8], StatusAttribute> {
    map(atom, |a| match a.as_str().to_ascii_uppercase().as_str() {
        "MESSAGES" => StatusAttribute::Messages,
        "RECENT" => StatusAttribute::Recent,
        "UIDNEXT" => StatusAttribute::UidNext,
        "UIDVALIDITY" => StatusAttribute::UidValidity,
        "UNSEEN" => StatusAttribute::Unseen,
        "HIGHESTMODSEQ" => StatusAttribute::HighestModSeq,
        "SIZE" => StatusAttribute::Size,
        "MAILBOXID" => StatusAttribute::MailboxId,
        _ => StatusAttribute::Messages,
    })(input)
}

fn status_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("STATUS"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    let (input, _) = sp(input)?;
    let (input, attributes) = paren_list(status_attribute)(input)?;
    Ok((
        input,
        CommandBody::Status {
            mailbox: Mailbox::new(mailbox),
            options: StatusOptions { attributes },
        },
    ))
}

fn flag(input: &[u8]) -> IResult<&[u8], Flag> {
    alt((
        map(preceded(char('\\'), atom), |a| Flag::system(a.as_str())),
        map(atom, Flag::keyword),
    ))(input)
}

/// `date-time` — `"dd-Mon-yyyy hh:mm:ss +zzzz"`, as used by `APPEND`'s
/// optional internal date.
fn date_time(input: &[u8]) -> IResult<&[u8], DateTime> {
    map_res(
        delimited(char('"'), take_while1(|b: u8| b != b'"'), char('"')),
        |bytes: &[u8]| {
            let text = std::str::from_utf8(bytes).map_err(|_| "invalid UTF-8 in date-time")?;
            chrono::DateTime::parse_from_str(text, "%d-%b-%Y %H:%M:%S %z")
                .map(DateTime::from)
                .map_err(|_| "malformed internal date")
        },
    )(input)
}

fn append_message(input: &[u8]) -> IResult<&[u8], AppendMessage> {
    let (input, flags) = opt(terminated(paren_list(flag), sp))(input)?;
    let (input, internal_date) = opt(terminated(date_time, sp))(input)?;
    let (input, lit) = literal(input)?;
    Ok((
        input,
        AppendMessage {
            options: AppendOptions {
                flags: flags.unwrap_or_default(),
                internal_date,
            },
            literal: lit.into_bytes(),
        },
    ))
}

fn append_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("APPEND"), sp)(input)?;
    let (input, mailbox) = mailbox_name(input)?;
    let (input, _) = sp(input)?;
    let (input, messages) = separated_list1(sp, append_message)(input)?;
    Ok((
        input,
        CommandBody::Append {
            mailbox: Mailbox::new(mailbox),
            messages,
        },
    ))
}

fn expunge_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = tag_no_case("EXPUNGE")(input)?;
    let (input, uids) = opt(preceded(sp, uid_set))(input)?;
    Ok((input, CommandBody::Expunge { uids }))
}

fn seq_set(input: &[u8]) -> IResult<&[u8], SeqSet> {
    map_res(seq_set_token, |bytes: &[u8]| {
        let text = std::str::from_utf8(bytes).map_err(|_| "invalid sequence set")?;
        SeqSet::parse(text).map_err(|_| "malformed sequence set")
    })(input)
}

fn uid_set(input: &[u8]) -> IResult<&[u8], UidSet> {
    map_res(seq_set_token, |bytes: &[u8]| {
        let text = std::str::from_utf8(bytes).map_err(|_| "invalid UID set")?;
        UidSet::parse(text).map_err(|_| "malformed UID set")
    })(input)
}

fn section_part(input: &[u8]) -> IResult<&[u8], SectionPart> {
    alt((
        value(SectionPart::Header, tag_no_case("HEADER.FIELDS.NOT"))
            .and_then(|_| nom::combinator::fail),
        map(
            preceded(pair(tag_no_case("HEADER.FIELDS.NOT"), sp), paren_list(header_field)),
            SectionPart::HeaderFieldsNot,
        ),
        map(
            preceded(pair(tag_no_case("HEADER.FIELDS"), sp), paren_list(header_field)),
            SectionPart::HeaderFields,
        ),
        value(SectionPart::Header, tag_no_case("HEADER")),
        value(SectionPart::Text, tag_no_case("TEXT")),
        value(SectionPart::Mime, tag_no_case("MIME")),
        map(
            pair(
                separated_list1(char('.'), number),
                opt(preceded(char('.'), section_part)),
            ),
            |(parts, tail)| SectionPart::Part(parts, tail.map(Box::new)),
        ),
        value(SectionPart::Full, nom::combinator::success(())),
    ))(input)
}

fn header_field(input: &[u8]) -> IResult<&[u8], String> {
    map(astring, |a| a.as_str().unwrap_or_default().to_string())(input)
}

fn partial(input: &[u8]) -> IResult<&[u8], Partial> {
    map(
        tuple((char('<'), number, char('.'), number, char('>'))),
        |(_, offset, _, count, _)| Partial { offset, count },
    )(input)
}

fn body_section(kind_tag: &'static str, kind: BodyKind) -> impl Fn(&[u8]) -> IResult<&[u8], FetchAttribute> {
    move |input: &[u8]| {
        let (input, _) = tag_no_case(kind_tag)(input)?;
        let (input, section) = delimited(char('['), section_part, char(']'))(input)?;
        let (input, partial) = opt(partial)(input)?;
        Ok((input, FetchAttribute::Section { kind, section, partial }))
    }
}

fn fetch_attribute(input: &[u8]) -> IResult<&[u8], FetchAttribute> {
    alt((
        value(FetchAttribute::Envelope, tag_no_case("ENVELOPE")),
        value(FetchAttribute::Flags, tag_no_case("FLAGS")),
        value(FetchAttribute::InternalDate, tag_no_case("INTERNALDATE")),
        value(FetchAttribute::RFC822Size, tag_no_case("RFC822.SIZE")),
        value(FetchAttribute::Uid, tag_no_case("UID")),
        value(FetchAttribute::ModSeq, tag_no_case("MODSEQ")),
        value(FetchAttribute::BodyStructure { extensible: true }, tag_no_case("BODYSTRUCTURE")),
        value(FetchAttribute::BodyStructure { extensible: false }, tag_no_case("BODY").and(nom::combinator::peek(nom::combinator::not(char('['))))),
        body_section("BODY.PEEK", BodyKind::BodyPeek),
        body_section("BODY", BodyKind::Body),
        body_section("BINARY.PEEK", BodyKind::BinaryPeek),
        value(FetchAttribute::Section { kind: BodyKind::BinarySize, section: SectionPart::Full, partial: None }, tag_no_case("BINARY.SIZE")).and(nom::combinator::success(())).map(|(v, _)| v),
        body_section("BINARY", BodyKind::Binary),
    ))(input)
}

fn fetch_att_list(input: &[u8]) -> IResult<&[u8], MacroOrAttributes> {
    alt((
        value(MacroOrAttributes::Macro(Macro::All), tag_no_case("ALL")),
        value(MacroOrAttributes::Macro(Macro::Fast), tag_no_case("FAST")),
        value(MacroOrAttributes::Macro(Macro::Full), tag_no_case("FULL")),
        map(paren_list(fetch_attribute), MacroOrAttributes::Attributes),
        map(fetch_attribute, |a| MacroOrAttributes::Attributes(vec![a])),
    ))(input)
}

fn fetch_options(input: &[u8]) -> IResult<&[u8], FetchOptions> {
    map(
        opt(preceded(
            tuple((sp, char('('), tag_no_case("CHANGEDSINCE"), sp)),
            terminated(number64, char(')')),
        )),
        |changed_since| FetchOptions { changed_since },
    )(input)
}

/// `$` (RFC 5182 SEARCHRES) is accepted wherever a sequence set or UID set
/// is, ahead of the numeric grammar, since `$` never collides with a digit
/// or `*`.
fn numbered_set(num_kind: NumKind, input: &[u8]) -> IResult<&[u8], SeqSetOrUidSet> {
    if let Ok((rest, _)) = char::<_, nom::error::Error<&[u8]>>('$')(input) {
        return Ok((rest, SeqSetOrUidSet::SavedResult));
    }
    match num_kind {
        NumKind::Seq => map(seq_set, SeqSetOrUidSet::Seq)(input),
        NumKind::Uid => map(uid_set, SeqSetOrUidSet::Uid)(input),
    }
}

fn fetch_command(num_kind: NumKind) -> impl Fn(&[u8]) -> IResult<&[u8], CommandBody> {
    move |input: &[u8]| {
        let (input, _) = pair(tag_no_case("FETCH"), sp)(input)?;
        let (input, set) = numbered_set(num_kind, input)?;
        let (input, _) = sp(input)?;
        let (input, attributes) = fetch_att_list(input)?;
        let (input, options) = fetch_options(input)?;
        Ok((
            input,
            CommandBody::Fetch {
                num_kind,
                sequence_set: set,
                attributes,
                options,
            },
        ))
    }
}

fn store_options(input: &[u8]) -> IResult<&[u8], StoreOptions> {
    map(
        opt(terminated(
            preceded(
                tuple((char('('), tag_no_case("UNCHANGEDSINCE"), sp)),
                number64,
            ),
            pair(char(')'), sp),
        )),
        |unchanged_since| StoreOptions { unchanged_since },
    )(input)
}

fn store_command(num_kind: NumKind) -> impl Fn(&[u8]) -> IResult<&[u8], CommandBody> {
    move |input: &[u8]| {
        let (input, _) = pair(tag_no_case("STORE"), sp)(input)?;
        let (input, set) = numbered_set(num_kind, input)?;
        let (input, _) = sp(input)?;
        let (input, options) = store_options(input)?;
        let (input, kind_char) = opt(alt((char('+'), char('-'))))(input)?;
        let (input, _) = tag_no_case("FLAGS")(input)?;
        let (input, silent) = opt(tag_no_case(".SILENT"))(input)?;
        let (input, _) = sp(input)?;
        let (input, flags) = alt((paren_list(flag), map(flag, |f| vec![f])))(input)?;
        let kind = match kind_char {
            Some('+') => StoreType::Add,
            Some('-') => StoreType::Remove,
            _ => StoreType::Replace,
        };
        Ok((
            input,
            CommandBody::Store {
                num_kind,
                sequence_set: set,
                kind,
                response: if silent.is_some() { StoreResponse::Silent } else { StoreResponse::Answer },
                flags,
                options,
            },
        ))
    }
}

fn copy_command(num_kind: NumKind) -> impl Fn(&[u8]) -> IResult<&[u8], CommandBody> {
    move |input: &[u8]| {
        let (input, _) = pair(tag_no_case("COPY"), sp)(input)?;
        let (input, set) = numbered_set(num_kind, input)?;
        let (input, _) = sp(input)?;
        let (input, mailbox) = mailbox_name(input)?;
        Ok((
            input,
            CommandBody::Copy {
                num_kind,
                sequence_set: set,
                mailbox: Mailbox::new(mailbox),
            },
        ))
    }
}

fn move_command(num_kind: NumKind) -> impl Fn(&[u8]) -> IResult<&[u8], CommandBody> {
    move |input: &[u8]| {
        let (input, _) = pair(tag_no_case("MOVE"), sp)(input)?;
        let (input, set) = numbered_set(num_kind, input)?;
        let (input, _) = sp(input)?;
        let (input, mailbox) = mailbox_name(input)?;
        Ok((
            input,
            CommandBody::Move {
                num_kind,
                sequence_set: set,
                mailbox: Mailbox::new(mailbox),
            },
        ))
    }
}

fn return_options(input: &[u8]) -> IResult<&[u8], ReturnOptions> {
    map(paren_list(return_option_atom), |atoms| {
        let mut opts = ReturnOptions::default();
        for a in atoms {
            match a.as_str() {
                "MIN" => opts.min = true,
                "MAX" => opts.max = true,
                "ALL" => opts.all = true,
                "COUNT" => opts.count = true,
                "SAVE" => opts.save = true,
                _ => {}
            }
        }
        opts
    })(input)
}

fn return_option_atom(input: &[u8]) -> IResult<&[u8], String> {
    map(atom, |a| a.as_str().to_ascii_uppercase())(input)
}

fn search_key(input: &[u8]) -> IResult<&[u8], SearchKey> {
    alt((
        alt((
            value(SearchKey::All, tag_no_case("ALL")),
            value(SearchKey::Answered, tag_no_case("ANSWERED")),
            value(SearchKey::Deleted, tag_no_case("DELETED")),
            value(SearchKey::Draft, tag_no_case("DRAFT")),
            value(SearchKey::Flagged, tag_no_case("FLAGGED")),
            value(SearchKey::New, tag_no_case("NEW")),
            value(SearchKey::Old, tag_no_case("OLD")),
            value(SearchKey::Recent, tag_no_case("RECENT")),
            value(SearchKey::Seen, tag_no_case("SEEN")),
            value(SearchKey::Unanswered, tag_no_case("UNANSWERED")),
            value(SearchKey::Undeleted, tag_no_case("UNDELETED")),
            value(SearchKey::Undraft, tag_no_case("UNDRAFT")),
            value(SearchKey::Unflagged, tag_no_case("UNFLAGGED")),
            value(SearchKey::Unseen, tag_no_case("UNSEEN")),
            value(SearchKey::SavedResult, char('$')),
        )),
        alt((
            map(preceded(pair(tag_no_case("BCC"), sp), search_astring), SearchKey::Bcc),
            map(preceded(pair(tag_no_case("CC"), sp), search_astring), SearchKey::Cc),
            map(preceded(pair(tag_no_case("FROM"), sp), search_astring), SearchKey::From),
            map(preceded(pair(tag_no_case("SUBJECT"), sp), search_astring), SearchKey::Subject),
            map(preceded(pair(tag_no_case("TO"), sp), search_astring), SearchKey::To),
            map(preceded(pair(tag_no_case("BODY"), sp), search_astring), SearchKey::Body),
            map(preceded(pair(tag_no_case("TEXT"), sp), search_astring), SearchKey::Text),
            map(preceded(pair(tag_no_case("KEYWORD"), sp), search_astring), SearchKey::Keyword),
            map(preceded(pair(tag_no_case("UNKEYWORD"), sp), search_astring), SearchKey::Unkeyword),
            map(preceded(tuple((tag_no_case("HEADER"), sp)), pair(terminated(search_astring, sp), search_astring)), |(k, v)| SearchKey::Header(k, v)),
        )),
        alt((
            map(preceded(pair(tag_no_case("LARGER"), sp), number), SearchKey::Larger),
            map(preceded(pair(tag_no_case("SMALLER"), sp), number), SearchKey::Smaller),
            map(preceded(pair(tag_no_case("BEFORE"), sp), imap_date), SearchKey::Before),
            map(preceded(pair(tag_no_case("ON"), sp), imap_date), SearchKey::On),
            map(preceded(pair(tag_no_case("SINCE"), sp), imap_date), SearchKey::Since),
            map(preceded(pair(tag_no_case("SENTBEFORE"), sp), imap_date), SearchKey::SentBefore),
            map(preceded(pair(tag_no_case("SENTON"), sp), imap_date), SearchKey::SentOn),
            map(preceded(pair(tag_no_case("SENTSINCE"), sp), imap_date), SearchKey::SentSince),
        )),
        map(preceded(pair(tag_no_case("NOT"), sp), search_key), |k| SearchKey::Not(Box::new(k))),
        map(
            preceded(pair(tag_no_case("OR"), sp), pair(terminated(search_key, sp), search_key)),
            |(a, b)| SearchKey::Or(Box::new(a), Box::new(b)),
        ),
        map(uid_set_with_prefix, SearchKey::Uid),
        map(seq_set, SearchKey::SequenceSet),
        map(paren_list(search_key), SearchKey::And),
    ))(input)
}

fn uid_set_with_prefix(input: &[u8]) -> IResult<&[u8], UidSet> {
    preceded(pair(tag_no_case("UID"), sp), uid_set)(input)
}

fn search_astring(input: &[u8]) -> IResult<&[u8], String> {
    map(astring, |a| a.as_str().unwrap_or_default().to_string())(input)
}

fn imap_date(input: &[u8]) -> IResult<&[u8], imap_types::datetime::NaiveDate> {
    map_res(
        alt((
            delimited(char('"'), take_while1(|b: u8| b != b'"'), char('"')),
            take_while1(|b: u8| b != b' ' && b != b'\r'),
        )),
        |bytes: &[u8]| {
            let text = std::str::from_utf8(bytes).map_err(|_| "invalid UTF-8 in date")?;
            chrono::NaiveDate::parse_from_str(text, "%d-%b-%Y")
                .map(imap_types::datetime::NaiveDate::from)
                .map_err(|_| "malformed date")
        },
    )(input)
}

fn search_command(num_kind: NumKind) -> impl Fn(&[u8]) -> IResult<&[u8], CommandBody> {
    move |input: &[u8]| {
        let (input, _) = pair(tag_no_case("SEARCH"), sp)(input)?;
        let (input, ret) = opt(preceded(tuple((tag_no_case("RETURN"), sp)), return_options))(input)?;
        let (input, _) = opt(sp)(input)?;
        let (input, charset) = opt(terminated(
            preceded(pair(tag_no_case("CHARSET"), sp), search_astring),
            sp,
        ))(input)?;
        let (input, criteria) = separated_list1(sp, search_key)(input)?;
        let options = match ret {
            Some(opts) => SearchOptions::Extended(opts),
            None => SearchOptions::Classic,
        };
        Ok((
            input,
            CommandBody::Search {
                num_kind,
                charset,
                criteria,
                options,
            },
        ))
    }
}

fn uid_prefixed_command(input: &[u8]) -> IResult<&[u8], CommandBody> {
    let (input, _) = pair(tag_no_case("UID"), sp)(input)?;
    alt((
        copy_command(NumKind::Uid),
        move_command(NumKind::Uid),
        fetch_command(NumKind::Uid),
        store_command(NumKind::Uid),
        search_command(NumKind::Uid),
        expunge_command,
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_capability() {
        let cmd = decode_command(b"a1 CAPABILITY\r\n").unwrap();
        assert_eq!(cmd.tag.as_str(), "a1");
        assert_eq!(cmd.body, CommandBody::Capability);
    }

    #[test]
    fn decodes_login() {
        let cmd = decode_command(b"a1 LOGIN bob password\r\n").unwrap();
        match cmd.body {
            CommandBody::Login { username, password } => {
                assert_eq!(username.as_str(), Some("bob"));
                assert_eq!(password.declassify().as_str(), Some("password"));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn decodes_select_with_condstore() {
        let cmd = decode_command(b"a1 SELECT INBOX (CONDSTORE)\r\n").unwrap();
        match cmd.body {
            CommandBody::Select { mailbox, options } => {
                assert!(mailbox.is_inbox());
                assert!(options.condstore);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn decodes_append_with_literal() {
        let cmd = decode_command(b"a1 APPEND Drafts (\\Seen) {5}\r\nhello\r\n").unwrap();
        match cmd.body {
            CommandBody::Append { mailbox, messages } => {
                assert_eq!(mailbox.as_str(), "Drafts");
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].literal, b"hello");
                assert_eq!(messages[0].options.flags, vec![Flag::Seen]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn decodes_uid_fetch() {
        let cmd = decode_command(b"a1 UID FETCH 1:* (FLAGS UID)\r\n").unwrap();
        match cmd.body {
            CommandBody::Fetch { num_kind, .. } => assert_eq!(num_kind, NumKind::Uid),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn decodes_store_silent_add() {
        let cmd = decode_command(b"a1 STORE 1:3 +FLAGS.SILENT (\\Deleted)\r\n").unwrap();
        match cmd.body {
            CommandBody::Store { kind, response, flags, .. } => {
                assert_eq!(kind, StoreType::Add);
                assert_eq!(response, StoreResponse::Silent);
                assert_eq!(flags, vec![Flag::Deleted]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn decodes_search_saved_result() {
        let cmd = decode_command(b"a1 SEARCH RETURN (SAVE) UNSEEN\r\n").unwrap();
        match cmd.body {
            CommandBody::Search { options, criteria, .. } => {
                assert!(matches!(options, SearchOptions::Extended(opts) if opts.save));
                assert_eq!(criteria, vec![SearchKey::Unseen]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
