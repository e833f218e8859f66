use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{Document, DocumentKind};
use crate::error::{Result, XapiError};
use crate::lookup::{ConceptKind, Resolver};
use crate::template::{Template, ValidationMode};

/// Relation under `context.contextActivities`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRelation {
    /// Direct parent activities
    Parent,
    /// Indirectly related activities
    Grouping,
    /// Tagging activities, e.g. the profile version
    Category,
    /// Anything else
    Other,
}

impl ContextRelation {
    /// All relations in evaluation order
    pub const ALL: [ContextRelation; 4] = [
        ContextRelation::Parent,
        ContextRelation::Grouping,
        ContextRelation::Category,
        ContextRelation::Other,
    ];

    /// JSON key of the relation
    pub fn key(self) -> &'static str {
        match self {
            ContextRelation::Parent => "parent",
            ContextRelation::Grouping => "grouping",
            ContextRelation::Category => "category",
            ContextRelation::Other => "other",
        }
    }
}

/// Options applied when a builder is finalized
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Fill a missing statement `id` with a random UUID
    pub generate_ids: bool,
    /// Fill a missing statement `timestamp` with the current time
    pub generate_timestamps: bool,
    /// Language tag used for plain-string names and descriptions
    pub language: String,
    /// How template violations are reported
    pub validation: ValidationMode,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            generate_ids: true,
            generate_timestamps: true,
            language: "en".to_string(),
            validation: ValidationMode::FailFast,
        }
    }
}

/// Every settable field, used to gate setters by [`DocumentKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Actor,
    Verb,
    Object,
    Result,
    Context,
    Timestamp,
    Attachments,
    Name,
    Mbox,
    Account,
    Member,
    Description,
    Type,
    MoreInfo,
    Extensions,
    UsageType,
    ContentType,
    Length,
    Sha2,
    FileUrl,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Actor => "actor",
            Field::Verb => "verb",
            Field::Object => "object",
            Field::Result => "result",
            Field::Context => "context",
            Field::Timestamp => "timestamp",
            Field::Attachments => "attachments",
            Field::Name => "name",
            Field::Mbox => "mbox",
            Field::Account => "account",
            Field::Member => "member",
            Field::Description => "description",
            Field::Type => "type",
            Field::MoreInfo => "moreInfo",
            Field::Extensions => "extensions",
            Field::UsageType => "usageType",
            Field::ContentType => "contentType",
            Field::Length => "length",
            Field::Sha2 => "sha2",
            Field::FileUrl => "fileUrl",
        }
    }

    fn allowed_on(self, kind: DocumentKind) -> bool {
        use DocumentKind::*;
        match self {
            Field::Id => matches!(kind, Statement | Activity),
            Field::Actor
            | Field::Verb
            | Field::Object
            | Field::Result
            | Field::Context
            | Field::Timestamp
            | Field::Attachments => matches!(kind, Statement | SubStatement),
            Field::Name => matches!(kind, Agent | Group | Activity | Attachment),
            Field::Mbox | Field::Account => matches!(kind, Agent | Group),
            Field::Member => kind == Group,
            Field::Description => matches!(kind, Activity | Attachment),
            Field::Type | Field::MoreInfo | Field::Extensions => kind == Activity,
            Field::UsageType | Field::ContentType | Field::Length | Field::Sha2 | Field::FileUrl => {
                kind == Attachment
            }
        }
    }
}

/// Immutable, chainable builder for statements and their parts
///
/// Every setter borrows the builder and returns a new one, so a partially
/// filled builder can be reused as a template for several statements.
///
/// # Example
///
/// ```
/// use xapi_profiles::document::Builder;
///
/// # fn example() -> xapi_profiles::Result<()> {
/// let actor = Builder::agent().name("Ada")?.mbox("ada@example.com")?;
/// let lesson = Builder::activity("https://example.com/lessons/1")?.name("Lesson 1")?;
///
/// let statement = Builder::statement()
///     .actor(&actor)?
///     .verb("http://adlnet.gov/expapi/verbs/completed")?
///     .object(&lesson)?
///     .build()?;
///
/// assert_eq!(statement["actor"]["mbox"], "mailto:ada@example.com");
/// assert!(statement["id"].is_string());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    kind: DocumentKind,
    document: Document,
    resolver: Arc<Resolver>,
    template: Option<Arc<Template>>,
    options: BuildOptions,
}

impl Builder {
    /// Create an empty builder of the given kind
    pub fn new(kind: DocumentKind) -> Self {
        let document = match kind.object_type() {
            Some(object_type) => Document::new().set(&["objectType"], json!(object_type)),
            None => Document::new(),
        };
        Self {
            kind,
            document,
            resolver: Arc::new(Resolver::default()),
            template: None,
            options: BuildOptions::default(),
        }
    }

    /// Start a statement
    pub fn statement() -> Self {
        Self::new(DocumentKind::Statement)
    }

    /// Start a sub-statement
    pub fn sub_statement() -> Self {
        Self::new(DocumentKind::SubStatement)
    }

    /// Start an agent
    pub fn agent() -> Self {
        Self::new(DocumentKind::Agent)
    }

    /// Start a group
    pub fn group() -> Self {
        Self::new(DocumentKind::Group)
    }

    /// Start an activity with the given IRI
    pub fn activity(id: impl Into<String>) -> Result<Self> {
        Self::new(DocumentKind::Activity).id(id)
    }

    /// Start an attachment
    pub fn attachment() -> Self {
        Self::new(DocumentKind::Attachment)
    }

    /// Use `resolver` for every name lookup made by this builder
    pub fn with_resolver(&self, resolver: Arc<Resolver>) -> Self {
        Self { resolver, ..self.clone() }
    }

    /// Validate against `template` when built
    pub fn with_template(&self, template: Arc<Template>) -> Self {
        Self { template: Some(template), ..self.clone() }
    }

    /// Replace the finalization options
    pub fn with_options(&self, options: BuildOptions) -> Self {
        Self { options, ..self.clone() }
    }

    /// Kind of document being built
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Template attached to this builder, if any
    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    /// Current document snapshot
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Value at `path` in the current snapshot
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        self.document.get(path)
    }

    /// Store `value` at `path` without any kind checks
    pub(crate) fn set(&self, path: &[&str], value: Value) -> Self {
        self.with_document(self.document.set(path, value))
    }

    // ---- shared ----

    /// Set the statement UUID or the activity IRI
    pub fn id(&self, id: impl Into<String>) -> Result<Self> {
        self.field(Field::Id, &["id"], Value::String(id.into()))
    }

    /// Set the agent or group name, the activity name or the attachment display
    pub fn name(&self, name: &str) -> Result<Self> {
        self.check(Field::Name)?;
        match self.kind {
            DocumentKind::Agent | DocumentKind::Group => Ok(self.set(&["name"], json!(name))),
            DocumentKind::Activity => Ok(self.set(&["definition", "name"], self.language_map(name))),
            _ => Ok(self.set(&["display"], self.language_map(name))),
        }
    }

    /// Set the activity or attachment description
    pub fn description(&self, description: &str) -> Result<Self> {
        self.check(Field::Description)?;
        let path: &[&str] = match self.kind {
            DocumentKind::Activity => &["definition", "description"],
            _ => &["description"],
        };
        Ok(self.set(path, self.language_map(description)))
    }

    // ---- statements ----

    /// Set the actor from an agent or group builder
    pub fn actor(&self, actor: &Builder) -> Result<Self> {
        self.check(Field::Actor)?;
        if !actor.kind.is_actor() {
            return Err(XapiError::DisallowedField {
                kind: actor.kind,
                field: Field::Actor.name(),
            });
        }
        Ok(self.set(&["actor"], actor.document.to_value()))
    }

    /// Set the verb by name or IRI
    pub fn verb(&self, verb: &str) -> Result<Self> {
        self.check(Field::Verb)?;
        let concept = self.resolver.resolve(verb, ConceptKind::Verb)?;
        let mut value = Map::new();
        value.insert("id".to_string(), Value::String(concept.id.clone()));
        if let Some(display) = concept.display() {
            value.insert("display".to_string(), display);
        }
        Ok(self.set(&["verb"], Value::Object(value)))
    }

    /// Set the object from an activity, agent, group or sub-statement builder
    ///
    /// Fields already present on the object (such as a pre-filled activity
    /// type) are kept unless `object` overrides them.
    pub fn object(&self, object: &Builder) -> Result<Self> {
        self.check(Field::Object)?;
        let allowed = match object.kind {
            DocumentKind::Activity | DocumentKind::Agent | DocumentKind::Group => true,
            DocumentKind::SubStatement => self.kind == DocumentKind::Statement,
            DocumentKind::Statement | DocumentKind::Attachment => false,
        };
        if !allowed {
            return Err(XapiError::DisallowedField {
                kind: object.kind,
                field: Field::Object.name(),
            });
        }
        let mut merged = self.get(&["object"]).cloned().unwrap_or(Value::Null);
        if object.kind != DocumentKind::Activity || !merged.is_object() {
            merged = Value::Null;
        }
        merge(&mut merged, object.document.to_value());
        Ok(self.set(&["object"], merged))
    }

    /// Point the object at another statement
    pub fn object_statement_ref(&self, statement: Uuid) -> Result<Self> {
        self.field(
            Field::Object,
            &["object"],
            json!({"objectType": "StatementRef", "id": statement.to_string()}),
        )
    }

    /// Set the object activity type by name or IRI
    pub fn object_activity_type(&self, activity_type: &str) -> Result<Self> {
        self.check(Field::Object)?;
        let concept = self.resolver.resolve(activity_type, ConceptKind::ActivityType)?;
        let doc = self
            .document
            .set(&["object", "objectType"], json!("Activity"))
            .set(&["object", "definition", "type"], Value::String(concept.id));
        Ok(self.with_document(doc))
    }

    /// Set `result.success`
    pub fn success(&self, success: bool) -> Result<Self> {
        self.field(Field::Result, &["result", "success"], json!(success))
    }

    /// Set `result.completion`
    pub fn completion(&self, completion: bool) -> Result<Self> {
        self.field(Field::Result, &["result", "completion"], json!(completion))
    }

    /// Set `result.response`
    pub fn response(&self, response: &str) -> Result<Self> {
        self.field(Field::Result, &["result", "response"], json!(response))
    }

    /// Set `result.duration` as an ISO 8601 duration
    pub fn duration(&self, duration: &str) -> Result<Self> {
        self.field(Field::Result, &["result", "duration"], json!(duration))
    }

    /// Set `result.score.scaled`
    pub fn score_scaled(&self, scaled: f64) -> Result<Self> {
        self.field(Field::Result, &["result", "score", "scaled"], json!(scaled))
    }

    /// Set `result.score.raw`, with optional bounds
    pub fn score_raw(&self, raw: f64, min: Option<f64>, max: Option<f64>) -> Result<Self> {
        let mut next = self.field(Field::Result, &["result", "score", "raw"], json!(raw))?;
        if let Some(min) = min {
            next = next.set(&["result", "score", "min"], json!(min));
        }
        if let Some(max) = max {
            next = next.set(&["result", "score", "max"], json!(max));
        }
        Ok(next)
    }

    /// Set a result extension; `key` is a name or IRI
    pub fn result_extension(&self, key: &str, value: Value) -> Result<Self> {
        self.check(Field::Result)?;
        let concept = self.resolver.resolve(key, ConceptKind::ResultExtension)?;
        Ok(self.set(&["result", "extensions", concept.id.as_str()], value))
    }

    /// Set `context.registration`
    pub fn registration(&self, registration: Uuid) -> Result<Self> {
        self.field(
            Field::Context,
            &["context", "registration"],
            json!(registration.to_string()),
        )
    }

    /// Append an activity under `context.contextActivities`
    pub fn context_activity(&self, relation: ContextRelation, activity: &Builder) -> Result<Self> {
        self.check(Field::Context)?;
        if activity.kind != DocumentKind::Activity {
            return Err(XapiError::DisallowedField {
                kind: activity.kind,
                field: Field::Context.name(),
            });
        }
        let doc = self.document.push(
            &["context", "contextActivities", relation.key()],
            activity.document.to_value(),
        );
        Ok(self.with_document(doc))
    }

    /// Set `context.instructor`
    pub fn instructor(&self, instructor: &Builder) -> Result<Self> {
        self.check(Field::Context)?;
        if !instructor.kind.is_actor() {
            return Err(XapiError::DisallowedField {
                kind: instructor.kind,
                field: "instructor",
            });
        }
        Ok(self.set(&["context", "instructor"], instructor.document.to_value()))
    }

    /// Set `context.team`
    pub fn team(&self, team: &Builder) -> Result<Self> {
        self.check(Field::Context)?;
        if team.kind != DocumentKind::Group {
            return Err(XapiError::DisallowedField {
                kind: team.kind,
                field: "team",
            });
        }
        Ok(self.set(&["context", "team"], team.document.to_value()))
    }

    /// Set `context.platform`
    pub fn platform(&self, platform: &str) -> Result<Self> {
        self.field(Field::Context, &["context", "platform"], json!(platform))
    }

    /// Set `context.language`
    pub fn language(&self, language: &str) -> Result<Self> {
        self.field(Field::Context, &["context", "language"], json!(language))
    }

    /// Reference another statement from `context.statement`
    pub fn context_statement_ref(&self, statement: Uuid) -> Result<Self> {
        self.field(
            Field::Context,
            &["context", "statement"],
            json!({"objectType": "StatementRef", "id": statement.to_string()}),
        )
    }

    /// Set a context extension; `key` is a name or IRI
    pub fn context_extension(&self, key: &str, value: Value) -> Result<Self> {
        self.check(Field::Context)?;
        let concept = self.resolver.resolve(key, ConceptKind::ContextExtension)?;
        Ok(self.set(&["context", "extensions", concept.id.as_str()], value))
    }

    /// Set the statement timestamp
    pub fn timestamp(&self, timestamp: DateTime<Utc>) -> Result<Self> {
        self.field(Field::Timestamp, &["timestamp"], json!(format_timestamp(timestamp)))
    }

    /// Append an attachment
    pub fn attachment_entry(&self, attachment: &Builder) -> Result<Self> {
        self.check(Field::Attachments)?;
        if attachment.kind != DocumentKind::Attachment {
            return Err(XapiError::DisallowedField {
                kind: attachment.kind,
                field: Field::Attachments.name(),
            });
        }
        Ok(self.with_document(self.document.push(&["attachments"], attachment.document.to_value())))
    }

    // ---- agents and groups ----

    /// Set the mailbox; a bare address gains the `mailto:` scheme
    pub fn mbox(&self, mbox: &str) -> Result<Self> {
        let mbox = if mbox.starts_with("mailto:") {
            mbox.to_string()
        } else {
            format!("mailto:{}", mbox)
        };
        self.field(Field::Mbox, &["mbox"], Value::String(mbox))
    }

    /// Set the account identifier
    pub fn account(&self, home_page: &str, name: &str) -> Result<Self> {
        self.field(
            Field::Account,
            &["account"],
            json!({"homePage": home_page, "name": name}),
        )
    }

    /// Append a group member
    pub fn member(&self, member: &Builder) -> Result<Self> {
        self.check(Field::Member)?;
        if member.kind != DocumentKind::Agent {
            return Err(XapiError::DisallowedField {
                kind: member.kind,
                field: Field::Member.name(),
            });
        }
        Ok(self.with_document(self.document.push(&["member"], member.document.to_value())))
    }

    // ---- activities ----

    /// Set the activity type by name or IRI
    pub fn activity_type(&self, activity_type: &str) -> Result<Self> {
        self.check(Field::Type)?;
        let concept = self.resolver.resolve(activity_type, ConceptKind::ActivityType)?;
        Ok(self.set(&["definition", "type"], Value::String(concept.id)))
    }

    /// Set `definition.moreInfo`
    pub fn more_info(&self, url: &str) -> Result<Self> {
        self.field(Field::MoreInfo, &["definition", "moreInfo"], json!(url))
    }

    /// Set an activity extension; `key` is a name or IRI
    pub fn extension(&self, key: &str, value: Value) -> Result<Self> {
        self.check(Field::Extensions)?;
        let concept = self.resolver.resolve(key, ConceptKind::ActivityExtension)?;
        Ok(self.set(&["definition", "extensions", concept.id.as_str()], value))
    }

    // ---- attachments ----

    /// Set the attachment usage type by name or IRI
    pub fn usage_type(&self, usage_type: &str) -> Result<Self> {
        self.check(Field::UsageType)?;
        let concept = self.resolver.resolve(usage_type, ConceptKind::AttachmentUsageType)?;
        Ok(self.set(&["usageType"], Value::String(concept.id)))
    }

    /// Set the attachment MIME type
    pub fn content_type(&self, content_type: &str) -> Result<Self> {
        self.field(Field::ContentType, &["contentType"], json!(content_type))
    }

    /// Set the attachment length in octets
    pub fn length(&self, length: u64) -> Result<Self> {
        self.field(Field::Length, &["length"], json!(length))
    }

    /// Set the attachment SHA-2 hash
    pub fn sha2(&self, sha2: &str) -> Result<Self> {
        self.field(Field::Sha2, &["sha2"], json!(sha2))
    }

    /// Set the attachment file URL
    pub fn file_url(&self, url: &str) -> Result<Self> {
        self.field(Field::FileUrl, &["fileUrl"], json!(url))
    }

    // ---- finalization ----

    /// Finalize into a plain JSON value, validating against the attached template
    pub fn build(&self) -> Result<Value> {
        let mut document = self.document.clone();

        if self.kind == DocumentKind::Statement {
            if self.options.generate_ids && !document.contains(&["id"]) {
                document = document.set(&["id"], json!(Uuid::new_v4().to_string()));
            }
            if self.options.generate_timestamps && !document.contains(&["timestamp"]) {
                document = document.set(&["timestamp"], json!(format_timestamp(Utc::now())));
            }
        }

        for &field in required_fields(self.kind) {
            if !document.contains(&[field]) {
                return Err(XapiError::MissingField { kind: self.kind, field });
            }
        }

        if let Some(template) = &self.template {
            template.validate_with(document.as_value(), self.options.validation)?;
        }

        Ok(document.to_value())
    }

    fn check(&self, field: Field) -> Result<()> {
        if field.allowed_on(self.kind) {
            Ok(())
        } else {
            Err(XapiError::DisallowedField {
                kind: self.kind,
                field: field.name(),
            })
        }
    }

    fn field(&self, field: Field, path: &[&str], value: Value) -> Result<Self> {
        self.check(field)?;
        Ok(self.set(path, value))
    }

    fn with_document(&self, document: Document) -> Self {
        Self { document, ..self.clone() }
    }

    fn language_map(&self, text: &str) -> Value {
        let mut map = Map::new();
        map.insert(self.options.language.clone(), Value::String(text.to_string()));
        Value::Object(map)
    }
}

fn required_fields(kind: DocumentKind) -> &'static [&'static str] {
    match kind {
        DocumentKind::Statement | DocumentKind::SubStatement => &["actor", "verb", "object"],
        DocumentKind::Activity => &["id"],
        DocumentKind::Attachment => &["usageType", "display", "contentType", "length", "sha2"],
        DocumentKind::Agent | DocumentKind::Group => &[],
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Deep-merges `overlay` into `base`; objects merge key by key, anything else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
