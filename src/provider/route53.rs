use crate::classifier::{RawError, aggregate, fallback_text, status_kind};
use crate::error::{CanonicalError, ErrorKind};
use crate::message::{HttpRequest, HttpResponse};
use crate::traits::ErrorClassifier;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Route 53 reuses `InvalidChangeBatch` for several distinct conditions, so
/// entries under that code are classified by message text. Checked in order.
const CHANGE_BATCH_MESSAGE_OVERRIDES: &[(&str, ErrorKind)] = &[
    ("not found", ErrorKind::NotFound),
    ("already exists", ErrorKind::Conflict),
];

const INVALID_CHANGE_BATCH: &str = "InvalidChangeBatch";

fn code_kind(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "NoSuchHostedZone" | "NoSuchChange" | "NoSuchHealthCheck" | "NoSuchDelegationSet" => {
            ErrorKind::NotFound
        }
        "HostedZoneAlreadyExists"
        | "HealthCheckAlreadyExists"
        | "DelegationSetAlreadyCreated"
        | "HostedZoneNotEmpty"
        | "PriorRequestNotComplete" => ErrorKind::Conflict,
        "Throttling" | "ThrottlingException" => ErrorKind::RateLimited,
        "InvalidInput" | "InvalidDomainName" | "InvalidArgument" | INVALID_CHANGE_BATCH => {
            ErrorKind::InvalidInput
        }
        "AccessDenied" | "InvalidClientTokenId" | "SignatureDoesNotMatch"
        | "IncompleteSignature" => ErrorKind::AuthFailure,
        "InternalFailure" | "ServiceUnavailable" => ErrorKind::ServerFault,
        _ => return None,
    };
    Some(kind)
}

fn change_batch_override(message: &str) -> Option<ErrorKind> {
    CHANGE_BATCH_MESSAGE_OVERRIDES
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|(_, kind)| *kind)
}

/// The parts of a Route 53 error document the classifier reads.
#[derive(Debug, Default)]
struct ErrorDocument {
    root: Option<String>,
    errors: Vec<RawError>,
    batch_messages: Vec<String>,
    request_id: Option<String>,
}

fn append(field: &mut Option<String>, text: &str) {
    field.get_or_insert_with(String::new).push_str(text);
}

/// Parse either `<ErrorResponse><Error>...</Error><RequestId/></ErrorResponse>`
/// or `<InvalidChangeBatch><Messages><Message/>...</Messages></InvalidChangeBatch>`.
fn parse_error_document(xml: &str) -> Result<ErrorDocument, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = ErrorDocument::default();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<RawError> = None;

    loop {
        let text = match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if doc.root.is_none() {
                    doc.root = Some(name.clone());
                }
                if name == "Error" {
                    current = Some(RawError::default());
                }
                stack.push(name);
                continue;
            }
            Event::Empty(e) => {
                if doc.root.is_none() {
                    doc.root = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                continue;
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("Error")
                    && let Some(error) = current.take()
                {
                    doc.errors.push(error);
                }
                continue;
            }
            Event::Text(t) => t.unescape().map_err(|e| e.to_string())?.into_owned(),
            Event::CData(c) => String::from_utf8_lossy(&c.into_inner()).into_owned(),
            Event::Eof => break,
            _ => continue,
        };

        let depth = stack.len();
        let leaf = stack.last().map(String::as_str);
        let parent = depth.checked_sub(2).map(|i| stack[i].as_str());
        match (leaf, parent) {
            (Some("Code"), Some("Error")) => {
                if let Some(err) = current.as_mut() {
                    append(&mut err.code, &text);
                }
            }
            (Some("Type"), Some("Error")) => {
                if let Some(err) = current.as_mut() {
                    append(&mut err.error_type, &text);
                }
            }
            (Some("Message"), Some("Error")) => {
                if let Some(err) = current.as_mut() {
                    append(&mut err.message, &text);
                }
            }
            (Some("Message"), Some("Messages")) => doc.batch_messages.push(text),
            (Some("RequestId"), _) => append(&mut doc.request_id, &text),
            _ => {}
        }
    }

    if doc.root.is_none() {
        return Err("no root element".to_string());
    }
    Ok(doc)
}

/// Error classifier for the Amazon Route 53 API.
///
/// Handles the standard AWS `ErrorResponse` document and Route 53's
/// `InvalidChangeBatch` document, which lists one message per failed change.
/// Codes are mapped through a fixed table; codes the table does not know fall
/// back to the HTTP status.
pub struct Route53ErrorHandler;

impl Route53ErrorHandler {
    pub fn new() -> Self {
        Self
    }

    fn classify_entry(status: u16, raw: &RawError) -> ErrorKind {
        let code = raw.code.as_deref().unwrap_or_default();
        if code == INVALID_CHANGE_BATCH
            && let Some(kind) = raw.message.as_deref().and_then(change_batch_override)
        {
            return kind;
        }
        code_kind(code).unwrap_or_else(|| status_kind(status))
    }
}

impl Default for Route53ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier for Route53ErrorHandler {
    fn provider_id(&self) -> &'static str {
        "aws/route53"
    }

    fn classify(&self, request: &HttpRequest, response: &HttpResponse) -> CanonicalError {
        let status = response.status().as_u16();
        let header_request_id = response
            .headers()
            .first("x-amzn-RequestId")
            .map(str::to_string);
        let body = response.body_text();

        if body.trim().is_empty() {
            let entry = RawError::with_message(fallback_text(response));
            return aggregate(
                status,
                vec![(status_kind(status), entry)],
                header_request_id,
                fallback_text(response),
            );
        }

        let doc = match parse_error_document(&body) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(
                    status,
                    url = %request.url(),
                    error = %e,
                    "Unparseable Route 53 error document"
                );
                return aggregate(status, Vec::new(), header_request_id, fallback_text(response));
            }
        };

        let mut entries: Vec<RawError> = doc
            .batch_messages
            .into_iter()
            .map(|message| RawError {
                code: Some(INVALID_CHANGE_BATCH.to_string()),
                error_type: None,
                message: Some(message),
            })
            .collect();
        entries.extend(doc.errors);

        let classified = entries
            .into_iter()
            .map(|raw| (Self::classify_entry(status, &raw), raw))
            .collect();
        aggregate(
            status,
            classified,
            doc.request_id.or(header_request_id),
            fallback_text(response),
        )
    }
}
