use ahash::RandomState;
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

/// Erased value produced by every build step.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Parsed descriptors of every type seen through [`TypeInfo::of`].
static INTERNED: Lazy<RwLock<HashMap<TypeId, TypeInfo, RandomState>>> = Lazy::new(|| RwLock::new(HashMap::default()));

/// Runtime descriptor of a service type.
///
/// Rust has no runtime reflection, so generic structure is recovered from
/// [`type_name`]: `path<A, B>` is split into the definition path and its
/// argument descriptors. Open generic definitions carry an arity without arguments.
///
/// Equality and ordering are structural, so a descriptor built from a path equals the one
/// of the concrete type. Descriptors of concrete types also carry their [`TypeId`].
#[derive(Clone)]
pub struct TypeInfo {
    name: Arc<str>,
    args: Arc<[TypeInfo]>,
    arity: usize,
    id: Option<TypeId>,
}

impl TypeInfo {
    /// Descriptor of `T`, parsed once per type.
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        let id = TypeId::of::<T>();
        if let Some(info) = INTERNED.read().get(&id) {
            return info.clone();
        }

        let mut info = parse(type_name::<T>());
        info.id = Some(id);
        INTERNED.write().entry(id).or_insert(info).clone()
    }

    /// Descriptor of a non-generic type known only by its path.
    #[must_use]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            args: Arc::from([]),
            arity: 0,
            id: None,
        }
    }

    /// Open generic definition, e.g. `app::Repository<_>` for `open("app::Repository", 1)`.
    #[must_use]
    pub fn open(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self {
            name: name.into(),
            args: Arc::from([]),
            arity,
            id: None,
        }
    }

    #[must_use]
    pub fn generic(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = TypeInfo>) -> Self {
        let args: Arc<[TypeInfo]> = args.into_iter().collect();
        Self {
            name: name.into(),
            arity: args.len(),
            args,
            id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// [`TypeId`] of the concrete type. `None` for descriptors built from a path.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<TypeId> {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn with_id(mut self, id: TypeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Descriptor parsed from a rendered type path, e.g. one read back from generated source.
    #[inline]
    #[must_use]
    pub(crate) fn from_path(path: &str) -> Self {
        parse(path)
    }

    #[inline]
    #[must_use]
    pub fn args(&self) -> &[TypeInfo] {
        &self.args
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.arity > 0 && self.args.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_closed_generic(&self) -> bool {
        !self.args.is_empty()
    }

    /// Open definition of a closed generic. Non-generic types map to themselves.
    #[must_use]
    pub fn definition(&self) -> Self {
        Self {
            name: self.name.clone(),
            args: Arc::from([]),
            arity: self.arity,
            id: None,
        }
    }

    /// Closes an open definition. Returns `None` when the argument count doesn't match the arity.
    #[must_use]
    pub fn close(&self, args: &[TypeInfo]) -> Option<Self> {
        if !self.is_open() || args.len() != self.arity {
            return None;
        }
        Some(Self::generic(self.name.clone(), args.iter().cloned()))
    }

    /// Crate the type belongs to. Primitives and unnamed shapes belong to `core`.
    #[must_use]
    pub fn assembly(&self) -> &str {
        let name = strip_prefixes(&self.name);
        match name.split_once("::") {
            Some((krate, _)) if is_path_segment(krate) => krate,
            _ => "core",
        }
    }

    /// Collects the crates of this type and, recursively, of its generic arguments.
    pub fn references(&self, references: &mut BTreeSet<String>) {
        references.insert(self.assembly().to_owned());
        for arg in self.args.iter() {
            arg.references(references);
        }
    }

    #[must_use]
    pub fn short_name(&self) -> String {
        let mut short = base_short_name(&self.name).to_owned();
        if !self.args.is_empty() {
            short.push('<');
            for (index, arg) in self.args.iter().enumerate() {
                if index > 0 {
                    short.push_str(", ");
                }
                short.push_str(&arg.short_name());
            }
            short.push('>');
        } else if self.arity > 0 {
            short.push('<');
            short.push_str(&vec!["_"; self.arity].join(", "));
            short.push('>');
        }
        short
    }

    /// Snake-cased identifier used for generated variables and fields.
    #[must_use]
    pub(crate) fn variable_name(&self) -> String {
        let base = base_short_name(&self.name);
        if matches!(base, "Box" | "Arc" | "Rc") && self.args.len() == 1 {
            return self.args[0].variable_name();
        }

        let mut out = String::with_capacity(base.len() + 4);
        for (index, ch) in base.chars().enumerate() {
            if ch.is_uppercase() {
                if index > 0 && !out.ends_with('_') {
                    out.push('_');
                }
                out.extend(ch.to_lowercase());
            } else if ch.is_alphanumeric() {
                out.push(ch);
            } else if !out.ends_with('_') {
                out.push('_');
            }
        }
        let out = out.trim_matches('_').to_owned();
        if out.is_empty() || out.starts_with(|ch: char| ch.is_ascii_digit()) || is_keyword(&out) {
            return format!("{out}_value").trim_start_matches('_').to_owned();
        }
        out
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity == other.arity && self.args == other.args
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.args.cmp(&other.args))
            .then_with(|| self.arity.cmp(&other.arity))
    }
}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.hash(state);
        self.arity.hash(state);
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (index, arg) in self.args.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                Display::fmt(arg, f)?;
            }
            f.write_str(">")?;
        } else if self.arity > 0 {
            write!(f, "<{}>", vec!["_"; self.arity].join(", "))?;
        }
        Ok(())
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

fn parse(raw: &str) -> TypeInfo {
    let raw = raw.trim();
    if let Some(open) = generic_start(raw) {
        if raw.ends_with('>') {
            let args: Vec<TypeInfo> = split_top_level(&raw[open + 1..raw.len() - 1]).into_iter().map(parse).collect();
            return TypeInfo::generic(&raw[..open], args);
        }
    }
    TypeInfo::named(raw)
}

fn generic_start(raw: &str) -> Option<usize> {
    let index = raw.find('<')?;
    let head = &raw[..index];
    (!head.is_empty() && head.chars().all(|ch| ch.is_alphanumeric() || ch == '_' || ch == ':')).then_some(index)
}

fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut previous = '\0';
    for (index, ch) in inner.char_indices() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            // `->` in fn pointer types isn't a closing bracket
            '>' if previous != '-' => depth -= 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(inner[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
        previous = ch;
    }
    parts.push(inner[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

fn strip_prefixes(name: &str) -> &str {
    let mut name = name;
    loop {
        let stripped = name
            .trim_start_matches('&')
            .trim_start_matches("mut ")
            .trim_start_matches("dyn ")
            .trim_start_matches("impl ");
        if stripped.len() == name.len() {
            return name;
        }
        name = stripped;
    }
}

fn base_short_name(name: &str) -> &str {
    let name = strip_prefixes(name);
    let name = name.split(" +").next().unwrap_or(name);
    name.rsplit_once("::").map_or(name, |(_, short)| short)
}

fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|ch| ch.is_alphanumeric() || ch == '_')
}

fn is_keyword(ident: &str) -> bool {
    matches!(
        ident,
        "as" | "box"
            | "break"
            | "const"
            | "crate"
            | "dyn"
            | "else"
            | "enum"
            | "fn"
            | "for"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "ref"
            | "return"
            | "self"
            | "static"
            | "struct"
            | "super"
            | "trait"
            | "type"
            | "use"
            | "where"
            | "while"
    )
}

#[cfg(test)]
mod tests {
    use super::TypeInfo;

    use std::collections::BTreeSet;

    mod app {
        pub struct Repository<T>(pub T);
        pub struct User;
    }

    #[test]
    fn test_parse_generic() {
        let info = TypeInfo::of::<app::Repository<app::User>>();

        assert!(info.is_closed_generic());
        assert_eq!(info.arity(), 1);
        assert_eq!(info.args()[0], TypeInfo::of::<app::User>());
        assert_eq!(info.short_name(), "Repository<User>");
        assert_eq!(info.definition().close(&[TypeInfo::of::<app::User>()]), Some(info.clone()));
    }

    #[test]
    fn test_parse_nested() {
        let info = TypeInfo::of::<Vec<(u8, Option<String>)>>();

        assert_eq!(info.args().len(), 1);
        assert_eq!(info.args()[0].name(), "(u8, core::option::Option<alloc::string::String>)");

        let info = TypeInfo::of::<Box<dyn Fn(u8) -> u8>>();
        assert_eq!(info.args().len(), 1);
    }

    #[test]
    fn test_references_follow_generic_args() {
        let mut references = BTreeSet::new();
        TypeInfo::of::<Vec<app::User>>().references(&mut references);

        assert!(references.contains("alloc"));
        assert!(references.contains("joinery"));
    }

    #[test]
    fn test_open_definition() {
        let open = TypeInfo::open("app::Repository", 1);

        assert!(open.is_open());
        assert_eq!(open.to_string(), "app::Repository<_>");
        assert!(open.close(&[]).is_none());
        assert_eq!(open.close(&[TypeInfo::of::<u8>()]).unwrap().to_string(), "app::Repository<u8>");
    }

    #[test]
    fn test_of_is_interned() {
        let first = TypeInfo::of::<app::Repository<app::User>>();
        let second = TypeInfo::of::<app::Repository<app::User>>();

        assert!(std::sync::Arc::ptr_eq(&first.name, &second.name));
        assert_eq!(first.id(), Some(core::any::TypeId::of::<app::Repository<app::User>>()));
        // argument descriptors are parsed, not interned
        assert_eq!(first.args()[0].id(), None);
        assert_eq!(first.args()[0], TypeInfo::of::<app::User>());
    }

    #[test]
    fn test_path_round_trip() {
        let info = TypeInfo::of::<Vec<app::Repository<app::User>>>();

        assert_eq!(TypeInfo::from_path(&info.to_string()), info);
    }

    #[test]
    fn test_variable_name() {
        assert_eq!(TypeInfo::of::<app::User>().variable_name(), "user");
        assert_eq!(TypeInfo::named("app::HttpClient").variable_name(), "http_client");
        assert_eq!(TypeInfo::of::<Box<app::User>>().variable_name(), "user");
        assert_eq!(TypeInfo::of::<u8>().variable_name(), "u8");
    }
}
