//! Implementation of the Entity derive macro.
//!
//! Parsing and generation are split: [`parse_entity`] turns `#[orm(...)]`
//! attributes into an [`EntityDef`], [`generate_entity_impl`] renders it.

use std::sync::OnceLock;

use proc_macro2::TokenStream;
use regex::Regex;
use quote::{ToTokens, quote};
use syn::{
    Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitBool, LitInt, LitStr,
    PathArguments, Result, Type, meta::ParseNestedMeta, token,
};

/// Parsed definition of a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    pub name: Ident,
    pub table: Option<String>,
    pub schema: Option<String>,
    pub fields: Vec<EntityFieldDef>,
}

/// Column directive as written on a field.
#[derive(Debug, Default)]
pub struct ColumnAttr {
    pub name: Option<String>,
    pub sql_type: Option<String>,
    pub nullable: Option<bool>,
    pub unique: bool,
}

/// Join-column directive as written on a field.
#[derive(Debug, Default)]
pub struct JoinColumnAttr {
    pub name: Option<String>,
    pub referenced_column: Option<String>,
}

/// Relationship directive as written on a field.
#[derive(Debug)]
pub struct RelationAttr {
    /// `OneToOne`, `ManyToOne`, ...
    pub kind: &'static str,
    pub mapped_by: Option<String>,
    /// `All`, `Add`, `Get`, `Remove`.
    pub cascade: Vec<&'static str>,
}

#[derive(Debug)]
pub struct EntityFieldDef {
    pub name: Ident,
    pub ty: Type,
    pub skip: bool,
    pub id: bool,
    pub column: Option<ColumnAttr>,
    pub composite_key: Option<u16>,
    pub join_column: Option<JoinColumnAttr>,
    pub relation: Option<RelationAttr>,
}

impl EntityFieldDef {
    fn is_relationship(&self) -> bool {
        self.join_column.is_some() || self.relation.is_some()
    }
}

fn is_identifier(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

fn identifier_lit(lit: &LitStr) -> Result<String> {
    let value = lit.value();
    if is_identifier(&value) {
        Ok(value)
    } else {
        Err(Error::new_spanned(
            lit,
            format!("`{value}` is not a valid SQL identifier"),
        ))
    }
}

/// Parse a `DeriveInput` into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    let mut table = None;
    let mut schema = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(identifier_lit(&meta.value()?.parse::<LitStr>()?)?);
            } else if meta.path.is_ident("schema") {
                schema = Some(identifier_lit(&meta.value()?.parse::<LitStr>()?)?);
            } else {
                return Err(unknown_attr(&meta, "table, schema"));
            }
            Ok(())
        })?;
    }

    Ok(EntityDef {
        name: input.ident.clone(),
        table,
        schema,
        fields,
    })
}

fn parse_fields(fields: &Fields) -> Result<Vec<EntityFieldDef>> {
    match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .enumerate()
            .map(|(index, field)| parse_field(index, field))
            .collect(),
        Fields::Unnamed(_) => Err(Error::new_spanned(
            fields,
            "Entity requires a struct with named fields",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

fn unknown_attr(meta: &ParseNestedMeta<'_>, valid: &str) -> Error {
    let name = meta.path.to_token_stream().to_string();
    Error::new_spanned(
        &meta.path,
        format!("unknown orm attribute `{name}`. Valid attributes are: {valid}"),
    )
}

fn parse_field(index: usize, field: &Field) -> Result<EntityFieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut def = EntityFieldDef {
        name,
        ty: field.ty.clone(),
        skip: false,
        id: false,
        column: None,
        composite_key: None,
        join_column: None,
        relation: None,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("skip") {
                def.skip = true;
            } else if path.is_ident("id") {
                def.id = true;
            } else if path.is_ident("column") {
                def.column = Some(parse_column(&meta)?);
            } else if path.is_ident("composite_key") {
                let order = if meta.input.peek(syn::Token![=]) {
                    let lit: LitInt = meta.value()?.parse()?;
                    lit.base10_parse::<u16>()?
                } else {
                    u16::try_from(index)
                        .map_err(|_| meta.error("too many fields for an implicit key order"))?
                };
                def.composite_key = Some(order);
            } else if path.is_ident("join_column") {
                def.join_column = Some(parse_join_column(&meta)?);
            } else if let Some(kind) = relation_kind(path) {
                def.relation = Some(parse_relation(&meta, kind)?);
            } else {
                return Err(unknown_attr(
                    &meta,
                    "skip, id, column, composite_key, join_column, one_to_one, \
                     many_to_one, one_to_many, many_to_many",
                ));
            }
            Ok(())
        })?;
    }

    if def.skip && (def.id || def.column.is_some() || def.is_relationship()) {
        return Err(Error::new_spanned(
            &def.name,
            "a skipped field cannot carry other orm attributes",
        ));
    }
    if def.is_relationship() && extract_entity_type(&def.ty).is_none() {
        return Err(Error::new_spanned(
            &def.ty,
            "relationship fields must be `Reference<T>` (owning) or `Option<Box<T>>` (inverse)",
        ));
    }

    Ok(def)
}

fn relation_kind(path: &syn::Path) -> Option<&'static str> {
    [
        ("one_to_one", "OneToOne"),
        ("many_to_one", "ManyToOne"),
        ("one_to_many", "OneToMany"),
        ("many_to_many", "ManyToMany"),
    ]
    .into_iter()
    .find(|(attr, _)| path.is_ident(attr))
    .map(|(_, kind)| kind)
}

fn parse_column(meta: &ParseNestedMeta<'_>) -> Result<ColumnAttr> {
    let mut column = ColumnAttr::default();
    if !meta.input.peek(token::Paren) {
        return Ok(column);
    }
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("name") {
            column.name = Some(identifier_lit(&inner.value()?.parse::<LitStr>()?)?);
        } else if inner.path.is_ident("sql_type") {
            let lit: LitStr = inner.value()?.parse()?;
            column.sql_type = Some(lit.value());
        } else if inner.path.is_ident("nullable") {
            let lit: LitBool = inner.value()?.parse()?;
            column.nullable = Some(lit.value);
        } else if inner.path.is_ident("unique") {
            column.unique = if inner.input.peek(syn::Token![=]) {
                inner.value()?.parse::<LitBool>()?.value
            } else {
                true
            };
        } else {
            return Err(unknown_attr(&inner, "name, sql_type, nullable, unique"));
        }
        Ok(())
    })?;
    Ok(column)
}

fn parse_join_column(meta: &ParseNestedMeta<'_>) -> Result<JoinColumnAttr> {
    let mut join = JoinColumnAttr::default();
    if !meta.input.peek(token::Paren) {
        return Ok(join);
    }
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("name") {
            join.name = Some(identifier_lit(&inner.value()?.parse::<LitStr>()?)?);
        } else if inner.path.is_ident("referenced_column") {
            join.referenced_column = Some(identifier_lit(&inner.value()?.parse::<LitStr>()?)?);
        } else {
            return Err(unknown_attr(&inner, "name, referenced_column"));
        }
        Ok(())
    })?;
    Ok(join)
}

fn parse_relation(meta: &ParseNestedMeta<'_>, kind: &'static str) -> Result<RelationAttr> {
    let mut relation = RelationAttr {
        kind,
        mapped_by: None,
        cascade: Vec::new(),
    };
    if !meta.input.peek(token::Paren) {
        return Ok(relation);
    }
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("mapped_by") {
            let lit: LitStr = inner.value()?.parse()?;
            relation.mapped_by = Some(lit.value());
        } else if inner.path.is_ident("cascade") {
            inner.parse_nested_meta(|cascade| {
                let variant = [
                    ("all", "All"),
                    ("add", "Add"),
                    ("get", "Get"),
                    ("remove", "Remove"),
                ]
                .into_iter()
                .find(|(attr, _)| cascade.path.is_ident(attr))
                .map(|(_, variant)| variant)
                .ok_or_else(|| unknown_attr(&cascade, "all, add, get, remove"))?;
                relation.cascade.push(variant);
                Ok(())
            })?;
        } else {
            return Err(unknown_attr(&inner, "mapped_by, cascade"));
        }
        Ok(())
    })?;
    Ok(relation)
}

/// Peel `Option`, `Box` and `Reference` wrappers to reach the entity type.
fn extract_entity_type(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if !matches!(
        segment.ident.to_string().as_str(),
        "Option" | "Box" | "Reference"
    ) {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let Some(GenericArgument::Type(inner)) = args.args.first() else {
        return None;
    };
    extract_entity_type(inner).or(Some(inner))
}

/// Generate the `DynEntity` and `Entity` implementations.
pub fn generate_entity_impl(def: &EntityDef) -> TokenStream {
    let name = &def.name;
    let type_name = name.to_string();
    let mapped: Vec<&EntityFieldDef> = def.fields.iter().filter(|f| !f.skip).collect();

    let table = {
        let mut directive = quote!(::relmap_core::TableDirective::new());
        if let Some(table) = &def.table {
            directive = quote!(#directive.name(#table));
        }
        if let Some(schema) = &def.schema {
            directive = quote!(#directive.schema(#schema));
        }
        directive
    };

    let field_mappings = mapped.iter().map(|f| field_mapping(f));

    let columns: Vec<&&EntityFieldDef> = mapped.iter().filter(|f| !f.is_relationship()).collect();
    let relations: Vec<&&EntityFieldDef> = mapped.iter().filter(|f| f.is_relationship()).collect();

    let read_arms = columns.iter().map(|f| {
        let ident = &f.name;
        let key = ident.to_string();
        quote! {
            #key => ::core::option::Option::Some(::relmap_core::ColumnValue::to_value(&self.#ident)),
        }
    });
    let write_arms = columns.iter().map(|f| {
        let ident = &f.name;
        let ty = &f.ty;
        let key = ident.to_string();
        quote! {
            #key => {
                self.#ident = <#ty as ::relmap_core::ColumnValue>::from_value(value)
                    .map_err(|e| ::relmap_core::Error::conversion(field, e))?;
                ::core::result::Result::Ok(())
            }
        }
    });
    let assoc_arms = relations.iter().map(|f| {
        let ident = &f.name;
        let key = ident.to_string();
        quote! { #key => ::core::option::Option::Some(&self.#ident), }
    });
    let assoc_mut_arms = relations.iter().map(|f| {
        let ident = &f.name;
        let key = ident.to_string();
        quote! { #key => ::core::option::Option::Some(&mut self.#ident), }
    });

    quote! {
        impl ::relmap_core::DynEntity for #name {
            fn entity_mapping(&self) -> &'static ::relmap_core::EntityMapping {
                <Self as ::relmap_core::Entity>::mapping()
            }

            fn read(&self, field: &str) -> ::core::option::Option<::relmap_core::Value> {
                match field {
                    #(#read_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables, unreachable_code)]
            fn write(
                &mut self,
                field: &str,
                value: ::relmap_core::Value,
            ) -> ::relmap_core::Result<()> {
                match field {
                    #(#write_arms)*
                    _ => ::core::result::Result::Err(::relmap_core::Error::mapping(
                        #type_name,
                        ::std::format!("no column field `{field}`"),
                    )),
                }
            }

            fn association(
                &self,
                field: &str,
            ) -> ::core::option::Option<&dyn ::relmap_core::Association> {
                match field {
                    #(#assoc_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn association_mut(
                &mut self,
                field: &str,
            ) -> ::core::option::Option<&mut dyn ::relmap_core::Association> {
                match field {
                    #(#assoc_mut_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }
        }

        impl ::relmap_core::Entity for #name {
            fn mapping() -> &'static ::relmap_core::EntityMapping {
                static MAPPING: ::relmap_core::EntityMapping = ::relmap_core::EntityMapping {
                    type_name: #type_name,
                    table: #table,
                    fields: &[#(#field_mappings),*],
                    type_id: ::std::any::TypeId::of::<#name>,
                    instantiate: ::relmap_core::instantiate::<#name>,
                };
                &MAPPING
            }
        }
    }
}

fn field_mapping(field: &EntityFieldDef) -> TokenStream {
    let key = field.name.to_string();

    let mut mapping = match (field.is_relationship(), extract_entity_type(&field.ty)) {
        (true, Some(target)) => quote! {
            ::relmap_core::FieldMapping::entity(
                #key,
                <#target as ::relmap_core::Entity>::mapping,
            )
        },
        _ => {
            let ty = &field.ty;
            quote! {
                ::relmap_core::FieldMapping::new(
                    #key,
                    <#ty as ::relmap_core::ColumnValue>::KIND,
                )
                .nullable(<#ty as ::relmap_core::ColumnValue>::NULLABLE)
            }
        }
    };

    if field.id {
        mapping = quote!(#mapping.id());
    }
    if let Some(order) = field.composite_key {
        mapping = quote!(#mapping.composite_key(#order));
    }
    if let Some(column) = &field.column {
        let mut directive = quote!(::relmap_core::ColumnDirective::new());
        if let Some(name) = &column.name {
            directive = quote!(#directive.name(#name));
        }
        if let Some(sql_type) = &column.sql_type {
            directive = quote!(#directive.sql_type(#sql_type));
        }
        if let Some(nullable) = column.nullable {
            directive = quote!(#directive.nullable(#nullable));
        }
        if column.unique {
            directive = quote!(#directive.unique(true));
        }
        mapping = quote!(#mapping.column(#directive));
    }
    if let Some(join) = &field.join_column {
        let mut directive = quote!(::relmap_core::JoinColumnDirective::new());
        if let Some(name) = &join.name {
            directive = quote!(#directive.name(#name));
        }
        if let Some(referenced) = &join.referenced_column {
            directive = quote!(#directive.referenced_column(#referenced));
        }
        mapping = quote!(#mapping.join_column(#directive));
    }
    if let Some(relation) = &field.relation {
        let kind = Ident::new(relation.kind, proc_macro2::Span::call_site());
        let mut directive =
            quote!(::relmap_core::RelationDirective::new(::relmap_core::RelationshipKind::#kind));
        if let Some(mapped_by) = &relation.mapped_by {
            directive = quote!(#directive.mapped_by(#mapped_by));
        }
        for cascade in &relation.cascade {
            let variant = Ident::new(cascade, proc_macro2::Span::call_site());
            directive = quote!(#directive.cascade(::relmap_core::CascadeType::#variant));
        }
        mapping = quote!(#mapping.relation(#directive));
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_extract_entity_type() {
        let ty: Type = parse_quote!(Reference<User>);
        let expected: Type = parse_quote!(User);
        assert_eq!(extract_entity_type(&ty), Some(&expected));

        let ty: Type = parse_quote!(Option<Box<Profile>>);
        let expected: Type = parse_quote!(Profile);
        assert_eq!(extract_entity_type(&ty), Some(&expected));

        let ty: Type = parse_quote!(String);
        assert!(extract_entity_type(&ty).is_none());
    }

    #[test]
    fn test_parse_user_entity() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "users", schema = "public")]
            struct User {
                #[orm(id)]
                id: Option<i64>,
                firstname: Option<String>,
                #[orm(column(name = "birthdate", sql_type = "DATE", nullable = false, unique))]
                birth_date: Option<NaiveDate>,
                #[orm(one_to_one(mapped_by = "user", cascade(all)))]
                profile: Option<Box<Profile>>,
                #[orm(skip)]
                scratch: u8,
            }
        };
        let def = parse_entity(&input).unwrap();
        assert_eq!(def.table.as_deref(), Some("users"));
        assert_eq!(def.schema.as_deref(), Some("public"));
        assert_eq!(def.fields.len(), 5);
        assert!(def.fields[0].id);

        let column = def.fields[2].column.as_ref().unwrap();
        assert_eq!(column.name.as_deref(), Some("birthdate"));
        assert_eq!(column.sql_type.as_deref(), Some("DATE"));
        assert_eq!(column.nullable, Some(false));
        assert!(column.unique);

        let relation = def.fields[3].relation.as_ref().unwrap();
        assert_eq!(relation.kind, "OneToOne");
        assert_eq!(relation.mapped_by.as_deref(), Some("user"));
        assert_eq!(relation.cascade, ["All"]);
        assert!(def.fields[4].skip);
    }

    #[test]
    fn test_parse_owning_and_composite() {
        let input: DeriveInput = parse_quote! {
            struct Profile {
                #[orm(composite_key)]
                region: String,
                #[orm(composite_key = 0)]
                code: String,
                #[orm(join_column(name = "user_id", referenced_column = "id"))]
                user: Reference<User>,
            }
        };
        let def = parse_entity(&input).unwrap();
        assert_eq!(def.fields[0].composite_key, Some(0));
        assert_eq!(def.fields[1].composite_key, Some(0));
        let join = def.fields[2].join_column.as_ref().unwrap();
        assert_eq!(join.name.as_deref(), Some("user_id"));
        assert_eq!(join.referenced_column.as_deref(), Some("id"));
    }

    #[test]
    fn test_is_identifier() {
        for name in ["users", "_tmp", "birth_date2"] {
            assert!(is_identifier(name), "{name}");
        }
        for name in ["", "2fa", "bad table", "users;drop"] {
            assert!(!is_identifier(name), "{name}");
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "bad table")]
            struct Bad { id: i64 }
        };
        assert!(parse_entity(&input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Bad {
                #[orm(join_column)]
                user: i64,
            }
        };
        assert!(parse_entity(&input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Bad {
                #[orm(cascade)]
                user: i64,
            }
        };
        assert!(parse_entity(&input).is_err());

        let input: DeriveInput = parse_quote! {
            enum Bad { A }
        };
        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn test_generated_mapping_mentions_directives() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "users")]
            struct User {
                #[orm(id)]
                id: Option<i64>,
                firstname: String,
                #[orm(one_to_one(mapped_by = "user", cascade(all)))]
                profile: Option<Box<Profile>>,
            }
        };
        let def = parse_entity(&input).unwrap();
        let tokens = generate_entity_impl(&def).to_string();
        assert!(tokens.contains(
            "nullable (< String as :: relmap_core :: ColumnValue > :: NULLABLE)"
        ));
        assert!(tokens.contains("TableDirective :: new () . name (\"users\")"));
        assert!(tokens.contains("mapped_by (\"user\")"));
        assert!(tokens.contains("CascadeType :: All"));
        assert!(tokens.contains("< Profile as :: relmap_core :: Entity > :: mapping"));
    }
}
