//! Procedural macros used to generate getters and setters for PathBuilderSettings

use proc_macro2::TokenStream;
use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::parse::{Parse, ParseStream, Result};
use syn::{Expr, Ident, Token};

type ValueName = Ident;
type ValueType = Ident;
type DefaultValue = Expr;

/// Signature contains the results of parsing a pbs_gets_and_sets definition, i.e., the
/// name of a value stored in a PathBuilderSettings map and the corresponding type. For example:
///     ```ignore
///     pbs_gets_and_sets!(PS_MAX_PATH_DEPTH, u32);
///     ```
struct Signature {
    value_name: ValueName,
    value_type: ValueType,
}

impl Parse for Signature {
    fn parse(stream: ParseStream<'_>) -> Result<Self> {
        let value_name = stream.parse()?;
        let _comma: Token!(,) = stream.parse()?;
        let value_type = stream.parse()?;
        Ok(Signature {
            value_name,
            value_type,
        })
    }
}

/// SignatureWithDefault contains the results of parsing a pbs_gets_and_sets_with_default definition, i.e., the
/// name of a value stored in a PathBuilderSettings map, the corresponding type and the default value. For example:
///     ```ignore
///     pbs_gets_and_sets_with_default!(PS_ENFORCE_TRUST_ANCHOR_VALIDITY, bool, true);
///     ```
struct SignatureWithDefault {
    value_name: ValueName,
    value_type: ValueType,
    default_value: DefaultValue,
}

impl Parse for SignatureWithDefault {
    fn parse(stream: ParseStream<'_>) -> Result<Self> {
        let value_name = stream.parse()?;
        let _comma: Token!(,) = stream.parse()?;
        let value_type = stream.parse()?;
        let _comma2: Token!(,) = stream.parse()?;
        let default_value = stream.parse()?;
        Ok(SignatureWithDefault {
            value_name,
            value_type,
            default_value,
        })
    }
}

/// is_string_numeric is used to determine if a string value contains only numeric characters.
/// It is used to process a slice that omits the first character, i.e., in order to identify
/// types like u8, u32, etc.
fn is_string_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_numeric())
}

/// Names pieces generated for one setting: getter, setter, PathBuilderSettingTypes variant and doc strings.
struct Accessors {
    getter: Ident,
    setter: Ident,
    variant: Ident,
    getter_comment: String,
    setter_comment: String,
}

fn accessors(flag: &Ident, value_type: &Ident) -> Accessors {
    let flag_name = flag.to_string();
    let suffix = match flag_name.strip_prefix("PS_") {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => abort!(flag, "setting names must begin with PS_"),
    };
    let getter_str = format!("get_{}", suffix);
    let setter_str = format!("set_{}", suffix);

    let type_str = value_type.to_string();
    let variant_str = if type_str == "bool" {
        "Bool".to_string()
    } else if is_string_numeric(&type_str[1..]) {
        type_str.to_uppercase()
    } else {
        type_str
    };

    Accessors {
        getter: Ident::new(&getter_str, flag.span()),
        setter: Ident::new(&setter_str, flag.span()),
        variant: Ident::new(&variant_str, value_type.span()),
        getter_comment: format!(
            "`{}` is used to retrieve the `{}` value from a [`PathBuilderSettings`] instance",
            getter_str, flag_name
        ),
        setter_comment: format!(
            "`{}` is used to set the `{}` value in a [`PathBuilderSettings`] instance",
            setter_str, flag_name
        ),
    }
}

fn setter_tokens(flag: &Ident, value_type: &Ident, a: &Accessors) -> TokenStream {
    let setter = &a.setter;
    let variant = &a.variant;
    let setter_comment = &a.setter_comment;
    quote! {
        #[doc = #setter_comment]
        pub fn #setter(&mut self, v: #value_type) {
            self.0.insert(
                #flag.to_string(),
                PathBuilderSettingTypes::#variant(v),
            );
        }
    }
}

/// `pbs_gets_and_sets` generates a getter returning `Option<T>` and a setter for a setting that has no default.
#[proc_macro]
#[proc_macro_error]
pub fn pbs_gets_and_sets(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let signature = syn::parse_macro_input!(input as Signature);
    let flag = signature.value_name;
    let value_type = signature.value_type;
    let a = accessors(&flag, &value_type);
    let getter = &a.getter;
    let variant = &a.variant;
    let getter_comment = &a.getter_comment;
    let setter = setter_tokens(&flag, &value_type, &a);

    let tokens = quote! {
        impl PathBuilderSettings {
            #[doc = #getter_comment]
            pub fn #getter(&self) -> Option<#value_type> {
                match self.0.get(#flag) {
                    Some(PathBuilderSettingTypes::#variant(v)) => Some(v.clone()),
                    _ => None,
                }
            }
            #setter
        }
    };
    tokens.into()
}

/// `pbs_gets_and_sets_with_default` generates a getter returning `T`, falling back to the given
/// default when the setting is absent or holds a different type, and a setter.
#[proc_macro]
#[proc_macro_error]
pub fn pbs_gets_and_sets_with_default(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let signature = syn::parse_macro_input!(input as SignatureWithDefault);
    let flag = signature.value_name;
    let value_type = signature.value_type;
    let default_value = signature.default_value;
    let a = accessors(&flag, &value_type);
    let getter = &a.getter;
    let variant = &a.variant;
    let getter_comment = &a.getter_comment;
    let setter = setter_tokens(&flag, &value_type, &a);

    let tokens = quote! {
        impl PathBuilderSettings {
            #[doc = #getter_comment]
            pub fn #getter(&self) -> #value_type {
                match self.0.get(#flag) {
                    Some(PathBuilderSettingTypes::#variant(v)) => v.clone(),
                    _ => #default_value,
                }
            }
            #setter
        }
    };
    tokens.into()
}
