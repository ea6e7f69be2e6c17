//! # steadydb-derive
//!
//! `#[derive(Record)]` for steadydb records.
//!
//! The derive registers the struct's fields, in declaration order, as a
//! `FieldSet` built once on first use, and implements field access by
//! index on top of each field type's `FieldValue` impl.
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadydb_orm::Record;
//!
//! #[derive(Record, Default)]
//! struct Song {
//!     id: Option<i64>,
//!     #[record(required)]
//!     title: String,
//!     #[record(default = 1)]
//!     rating: i64,
//!     #[record(map_json)]
//!     tags: Vec<String>,
//!     #[record(rename = "ct")]
//!     created_at: Option<NaiveDateTime>,
//!     #[record(skip)]
//!     cached_label: String,
//! }
//! ```

#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Expr, ExprLit, Fields, Lit, LitStr, parse_macro_input};

/// Field configuration extracted from `#[record(..)]` attributes.
#[derive(Default)]
struct FieldConfig {
    rename: Option<String>,
    alias: Option<String>,
    default: Option<Lit>,
    required: bool,
    map_json: bool,
    skip: bool,
}

fn parse_field_config(attrs: &[Attribute]) -> syn::Result<FieldConfig> {
    let mut config = FieldConfig::default();

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                config.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("alias") {
                config.alias = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                let value: Expr = meta.value()?.parse()?;
                match value {
                    Expr::Lit(ExprLit { lit, .. }) => config.default = Some(lit),
                    other => {
                        return Err(syn::Error::new_spanned(other, "default must be a literal"));
                    }
                }
            } else if meta.path.is_ident("required") {
                config.required = true;
            } else if meta.path.is_ident("map_json") {
                config.map_json = true;
            } else if meta.path.is_ident("skip") {
                config.skip = true;
            } else {
                return Err(meta.error("unknown record attribute"));
            }
            Ok(())
        })?;
    }

    Ok(config)
}

/// Derive macro implementing `steadydb_orm::Record`.
///
/// The struct must have named fields, no generic parameters, and a
/// `Default` impl. Every field that is not skipped must implement
/// `FieldValue`.
///
/// ## Field Attributes
///
/// - `#[record(rename = "column")]` - Column name; the camelCase alias follows it
/// - `#[record(alias = "key")]` - Key in input and output maps
/// - `#[record(required)]` - Input maps must provide a value
/// - `#[record(default = <literal>)]` - Value used when input omits the field
/// - `#[record(map_json)]` - Store the field as JSON text
/// - `#[record(skip)]` - Not a column; keeps its `Default` value
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match impl_record(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn impl_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record can only be derived for structs",
            ));
        }
    };

    let entity = name.to_string();
    let mut descriptors = Vec::new();
    let mut encodes = Vec::new();
    let mut decodes = Vec::new();
    let mut from_json = Vec::new();
    let mut to_json = Vec::new();

    for field in fields {
        let config = parse_field_config(&field.attrs)?;
        if config.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let index = descriptors.len();
        let column = config.rename.unwrap_or_else(|| ident.to_string());

        let mut descriptor = quote! {
            ::steadydb_orm::FieldDescriptor::new(
                #column,
                <#ty as ::steadydb_orm::FieldValue>::FIELD_TYPE,
            )
        };
        if let Some(alias) = config.alias {
            descriptor = quote! { #descriptor.alias(#alias) };
        }
        if let Some(default) = config.default {
            descriptor = quote! {
                #descriptor.default_value(::steadydb_orm::__private::serde_json::json!(#default))
            };
        }
        if config.required {
            descriptor = quote! { #descriptor.required() };
        }
        if config.map_json {
            descriptor = quote! { #descriptor.map_json() };
        }
        descriptors.push(descriptor);

        encodes.push(quote! {
            #index => ::steadydb_orm::value::encode(&fields[#index], &self.#ident)
        });
        decodes.push(quote! {
            #index => self.#ident = ::steadydb_orm::value::decode(&fields[#index], value)?
        });
        from_json.push(quote! {
            #index => self.#ident = ::steadydb_orm::value::from_json(&fields[#index], value)?
        });
        to_json.push(quote! {
            #index => Ok(::steadydb_orm::value::to_json(&self.#ident))
        });
    }

    Ok(quote! {
        impl ::steadydb_orm::Record for #name {
            fn field_set() -> &'static ::steadydb_orm::FieldSet {
                static FIELDS: ::std::sync::OnceLock<::steadydb_orm::FieldSet> =
                    ::std::sync::OnceLock::new();
                FIELDS.get_or_init(|| {
                    ::steadydb_orm::FieldSet::builder(#entity)
                        #(.field(#descriptors))*
                        .build()
                })
            }

            fn value(
                &self,
                index: usize,
            ) -> ::std::result::Result<
                ::steadydb_orm::__private::SqlValue,
                ::steadydb_orm::FieldError,
            > {
                let fields = <Self as ::steadydb_orm::Record>::field_set().fields();
                let _ = fields;
                match index {
                    #(#encodes,)*
                    _ => Err(::steadydb_orm::FieldError::UnknownIndex(index)),
                }
            }

            fn assign(
                &mut self,
                index: usize,
                value: &::steadydb_orm::__private::SqlValue,
            ) -> ::std::result::Result<(), ::steadydb_orm::FieldError> {
                let fields = <Self as ::steadydb_orm::Record>::field_set().fields();
                let _ = (fields, value);
                match index {
                    #(#decodes,)*
                    _ => return Err(::steadydb_orm::FieldError::UnknownIndex(index)),
                }
                Ok(())
            }

            fn assign_json(
                &mut self,
                index: usize,
                value: &::steadydb_orm::__private::serde_json::Value,
            ) -> ::std::result::Result<(), ::steadydb_orm::FieldError> {
                let fields = <Self as ::steadydb_orm::Record>::field_set().fields();
                let _ = (fields, value);
                match index {
                    #(#from_json,)*
                    _ => return Err(::steadydb_orm::FieldError::UnknownIndex(index)),
                }
                Ok(())
            }

            fn json(
                &self,
                index: usize,
            ) -> ::std::result::Result<
                ::steadydb_orm::__private::serde_json::Value,
                ::steadydb_orm::FieldError,
            > {
                match index {
                    #(#to_json,)*
                    _ => Err(::steadydb_orm::FieldError::UnknownIndex(index)),
                }
            }
        }
    })
}
