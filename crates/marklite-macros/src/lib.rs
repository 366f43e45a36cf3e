//! Derive macros for marklite configuration structs.
//!
//! `#[derive(Configurable)]` generates, for a struct with named fields:
//!
//! - `apply_override(&mut self, key, value)`: set one field from a
//!   `--config KEY=VALUE` pair, descending into `#[config(nested)]` sections
//!   through dotted keys
//! - `merge_fields(&mut self, other)`: fold a later config into this one
//! - `config_keys()`: every key `apply_override` accepts
//!
//! Field attributes: `key = "..."` renames the key, `nested` marks a section,
//! `skip` hides a field from overrides (it still merges), and `allow_empty`
//! lets an empty value reset an `Option` to `None`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
  Attribute,
  Data,
  DeriveInput,
  Field,
  Fields,
  GenericArgument,
  Ident,
  PathArguments,
  Type,
  parse_macro_input,
};

#[derive(Default)]
struct FieldConfig {
  key:         Option<String>,
  nested:      bool,
  skip:        bool,
  allow_empty: bool,
}

impl FieldConfig {
  fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
    let mut config = Self::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("config")) {
      attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("key") {
          let lit: syn::LitStr = meta.value()?.parse()?;
          config.key = Some(lit.value());
        } else if meta.path.is_ident("nested") {
          config.nested = true;
        } else if meta.path.is_ident("skip") {
          config.skip = true;
        } else if meta.path.is_ident("allow_empty") {
          config.allow_empty = true;
        } else {
          return Err(meta.error("unknown config attribute"));
        }
        Ok(())
      })?;
    }
    Ok(config)
  }
}

/// The shapes of field the generated code knows how to handle.
enum Shape<'a> {
  Option(&'a Type),
  Vec(&'a Type),
  Scalar(&'a Type),
}

impl<'a> Shape<'a> {
  fn of(ty: &'a Type) -> Self {
    if let Some(inner) = wrapped(ty, "Option") {
      Self::Option(inner)
    } else if let Some(inner) = wrapped(ty, "Vec") {
      Self::Vec(inner)
    } else {
      Self::Scalar(ty)
    }
  }
}

/// `T` when `ty` is `wrapper<T>`.
fn wrapped<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
  let Type::Path(path) = ty else {
    return None;
  };
  let segment = path.path.segments.last()?;
  if segment.ident != wrapper {
    return None;
  }
  let PathArguments::AngleBracketed(args) = &segment.arguments else {
    return None;
  };
  args.args.iter().find_map(|arg| {
    match arg {
      GenericArgument::Type(inner) => Some(inner),
      _ => None,
    }
  })
}

fn is_named(ty: &Type, name: &str) -> bool {
  matches!(ty, Type::Path(path)
    if path.path.segments.last().is_some_and(|s| s.ident == name))
}

/// Expression turning the `value: &str` in scope into a `ty`.
fn parse_value(ty: &Type, key: &str) -> proc_macro2::TokenStream {
  if is_named(ty, "bool") {
    quote! {
      match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => true,
        "false" | "no" | "off" | "0" => false,
        _ => {
          return Err(ConfigError::Config(format!(
            "Invalid boolean value for '{}': '{}'. Expected true/false, yes/no, on/off or 1/0",
            #key, value
          )));
        },
      }
    }
  } else if is_named(ty, "String") {
    quote! { value.to_owned() }
  } else if is_named(ty, "PathBuf") {
    quote! { ::std::path::PathBuf::from(value) }
  } else {
    quote! {
      value.parse::<#ty>().map_err(|_| ConfigError::Config(format!(
        "Invalid value for '{}': '{}'",
        #key, value
      )))?
    }
  }
}

struct ConfigField<'a> {
  ident:  &'a Ident,
  key:    String,
  ty:     &'a Type,
  config: FieldConfig,
}

impl<'a> ConfigField<'a> {
  fn new(field: &'a Field) -> syn::Result<Self> {
    let ident = field.ident.as_ref().ok_or_else(|| {
      syn::Error::new_spanned(field, "Configurable requires named fields")
    })?;
    let config = FieldConfig::from_attrs(&field.attrs)?;
    Ok(Self {
      ident,
      key: config.key.clone().unwrap_or_else(|| ident.to_string()),
      ty: &field.ty,
      config,
    })
  }

  /// Section type of a nested field, looking through `Option`.
  fn section(&self) -> &'a Type {
    match Shape::of(self.ty) {
      Shape::Option(inner) => inner,
      _ => self.ty,
    }
  }

  fn override_arm(&self) -> proc_macro2::TokenStream {
    let Self { ident, key, .. } = self;

    if self.config.nested {
      let prefix = format!("{key}.");
      let target = match Shape::of(self.ty) {
        Shape::Option(_) => {
          quote! { self.#ident.get_or_insert_with(Default::default) }
        },
        _ => quote! { self.#ident },
      };
      return quote! {
        if let Some(subkey) = key.strip_prefix(#prefix) {
          return #target.apply_override(subkey, value);
        }
      };
    }

    let assignment = match Shape::of(self.ty) {
      Shape::Option(inner) => {
        let parse = parse_value(inner, key);
        if self.config.allow_empty {
          quote! {
            self.#ident = if value.is_empty() { None } else { Some(#parse) };
          }
        } else {
          quote! { self.#ident = Some(#parse); }
        }
      },
      Shape::Vec(inner) => {
        let parse = parse_value(inner, key);
        quote! {
          self.#ident = value
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| -> Result<#inner, ConfigError> { Ok(#parse) })
            .collect::<Result<Vec<_>, _>>()?;
        }
      },
      Shape::Scalar(ty) => {
        let parse = parse_value(ty, key);
        quote! { self.#ident = #parse; }
      },
    };

    quote! {
      if key == #key {
        #assignment
        return Ok(());
      }
    }
  }

  fn key_list(&self) -> proc_macro2::TokenStream {
    let key = &self.key;
    if self.config.nested {
      let section = self.section();
      quote! {
        keys.extend(
          <#section>::config_keys()
            .into_iter()
            .map(|subkey| format!("{}.{}", #key, subkey)),
        );
      }
    } else {
      quote! { keys.push(#key.to_owned()); }
    }
  }

  fn merge_step(&self) -> proc_macro2::TokenStream {
    let ident = self.ident;
    match (self.config.nested, Shape::of(self.ty)) {
      (true, Shape::Option(_)) => {
        quote! {
          match (self.#ident.as_mut(), other.#ident) {
            (Some(section), Some(other)) => section.merge_fields(other),
            (None, Some(other)) => self.#ident = Some(other),
            _ => {},
          }
        }
      },
      (true, _) => quote! { self.#ident.merge_fields(other.#ident); },
      (false, Shape::Option(_)) => {
        quote! {
          if other.#ident.is_some() {
            self.#ident = other.#ident;
          }
        }
      },
      (false, Shape::Vec(_)) => quote! { self.#ident.extend(other.#ident); },
      (false, Shape::Scalar(_)) => quote! { self.#ident = other.#ident; },
    }
  }
}

/// Derive `apply_override`, `merge_fields` and `config_keys`.
#[proc_macro_derive(Configurable, attributes(config))]
pub fn derive_configurable(input: TokenStream) -> TokenStream {
  let input = parse_macro_input!(input as DeriveInput);
  expand(&input)
    .unwrap_or_else(syn::Error::into_compile_error)
    .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
  let Data::Struct(data) = &input.data else {
    return Err(syn::Error::new_spanned(
      input,
      "Configurable can only be derived for structs",
    ));
  };
  let Fields::Named(named) = &data.fields else {
    return Err(syn::Error::new_spanned(
      input,
      "Configurable requires named fields",
    ));
  };

  let fields = named
    .named
    .iter()
    .map(ConfigField::new)
    .collect::<syn::Result<Vec<_>>>()?;
  let visible: Vec<_> = fields.iter().filter(|f| !f.config.skip).collect();

  let override_arms = visible.iter().map(|f| f.override_arm());
  let key_lists = visible.iter().map(|f| f.key_list());
  let merge_steps = fields.iter().map(ConfigField::merge_step);

  let name = &input.ident;
  let (impl_generics, ty_generics, where_clause) =
    input.generics.split_for_impl();

  Ok(quote! {
    impl #impl_generics #name #ty_generics #where_clause {
      /// Set one field from a `KEY=VALUE` override. Nested sections are
      /// addressed with dotted keys.
      ///
      /// # Errors
      ///
      /// Returns an error for an unknown key or a value that does not parse.
      pub fn apply_override(
        &mut self,
        key: &str,
        value: &str,
      ) -> ::std::result::Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        #(#override_arms)*

        Err(ConfigError::Config(format!(
          "Unknown configuration key: '{key}'. Supported keys: {}",
          Self::config_keys().join(", ")
        )))
      }

      /// Every key accepted by `apply_override`.
      #[must_use]
      pub fn config_keys() -> Vec<String> {
        let mut keys = Vec::new();
        #(#key_lists)*
        keys
      }

      /// Merge a later config into this one: `Some` options replace,
      /// lists append, sections merge recursively and plain values replace.
      pub fn merge_fields(&mut self, other: Self) {
        #(#merge_steps)*
      }
    }
  })
}
