//! Attribute parsing for MetaClass derive macro

use darling::ast::NestedMeta;
use darling::{FromDeriveInput, FromField, FromMeta};
use syn::{DeriveInput, Expr, ExprLit, Ident, Lit, Meta, Path, Type};

/// `class_info(name = "value", ...)` in declaration order
#[derive(Debug, Default)]
pub struct ClassInfoList(pub Vec<(String, String)>);

impl FromMeta for ClassInfoList {
    fn from_list(items: &[NestedMeta]) -> darling::Result<Self> {
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            let NestedMeta::Meta(Meta::NameValue(nv)) = item else {
                return Err(darling::Error::custom("expected `name = \"value\"`").with_span(item));
            };
            let Some(name) = nv.path.get_ident() else {
                return Err(darling::Error::custom("expected a plain name").with_span(&nv.path));
            };
            let Expr::Lit(ExprLit {
                lit: Lit::Str(value),
                ..
            }) = &nv.value
            else {
                return Err(darling::Error::custom("expected a string literal").with_span(&nv.value));
            };
            pairs.push((name.to_string(), value.value()));
        }
        Ok(Self(pairs))
    }
}

/// Parsed #[meta(...)] attributes on the struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(meta), supports(struct_named))]
pub struct MetaClassArgs {
    /// Struct identifier
    pub ident: Ident,

    pub generics: syn::Generics,

    /// Struct fields
    pub data: darling::ast::Data<(), MetaFieldArgs>,

    /// Class name, defaults to the struct name
    #[darling(rename = "class", default)]
    pub class_name: Option<String>,

    #[darling(default)]
    pub class_info: ClassInfoList,

    /// Register a factory that builds the struct from `Default`
    #[darling(default)]
    pub constructible: bool,

    /// `fn(MetaObjectBuilder) -> MetaObjectBuilder` adding hand-written members
    #[darling(default)]
    pub methods: Option<Path>,
}

impl MetaClassArgs {
    pub fn class_name(&self) -> String {
        self.class_name
            .clone()
            .unwrap_or_else(|| self.ident.to_string())
    }
}

/// Parsed #[meta(...)] attributes on a field
#[derive(Debug, FromField)]
#[darling(attributes(meta))]
pub struct MetaFieldArgs {
    /// Field identifier
    pub ident: Option<Ident>,

    /// Field type
    pub ty: Type,

    /// The `ObjectBase` of the class
    #[darling(default)]
    pub base: bool,

    /// Embedded superclass object; its class becomes the super class
    #[darling(default)]
    pub extends: bool,

    /// Declared property backed by a `PropertyCell`
    #[darling(default)]
    pub property: bool,

    /// Property name, defaults to the field name
    #[darling(default)]
    pub name: Option<String>,

    /// Notify signal signature, e.g. `"bitrateChanged(u32)"`
    #[darling(default)]
    pub notify: Option<String>,

    /// No setter is generated
    #[darling(default)]
    pub readonly: bool,

    /// Left out of property snapshots
    #[darling(default)]
    pub transient: bool,

    /// Marks the user property of the class
    #[darling(default)]
    pub user: bool,
}

impl MetaFieldArgs {
    /// Field name with a leading underscore stripped
    pub fn clean_name(&self) -> String {
        let name = self
            .ident
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        name.strip_prefix('_').unwrap_or(&name).to_string()
    }

    pub fn property_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.clean_name())
    }
}

/// Parse a DeriveInput into MetaClassArgs
pub fn parse_meta_class(input: &DeriveInput) -> darling::Result<MetaClassArgs> {
    MetaClassArgs::from_derive_input(input)
}
