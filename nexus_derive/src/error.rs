//! Derive macro for error enums.
//!
//! Reads the `#[error("...")]` attribute on each variant and generates the
//! matching `Display` and `std::error::Error` impls. Tuple fields
//! interpolate as `{0}`, `{1}`; named fields as `{name}`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive supports enums only",
            ))
        }
    };

    let arms = data
        .variants
        .iter()
        .map(display_arm)
        .collect::<syn::Result<Vec<_>>>()?;

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #ident #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #( #arms )*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #ident #ty_generics #where_clause {}
    })
}

/// One match arm rendering a single variant's message.
fn display_arm(variant: &syn::Variant) -> syn::Result<TokenStream2> {
    let ident = &variant.ident;
    let message = message_of(variant)?;

    Ok(match &variant.fields {
        Fields::Unit => quote! {
            Self::#ident => write!(f, #message),
        },
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().map(|field| &field.ident).collect();
            quote! {
                Self::#ident { #( #names ),* } => write!(f, #message, #( #names = #names ),*),
            }
        }
        Fields::Unnamed(fields) => {
            let bindings: Vec<_> = (0..fields.unnamed.len())
                .map(|index| format_ident!("field{}", index))
                .collect();
            let message = positional_to_named(&message, bindings.len());
            quote! {
                Self::#ident( #( #bindings ),* ) => write!(f, #message, #( #bindings = #bindings ),*),
            }
        }
    })
}

/// Extracts the string from the variant's `#[error("...")]` attribute.
fn message_of(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        if let Meta::List(list) = &attr.meta {
            if let Ok(Lit::Str(message)) = syn::parse2::<Lit>(list.tokens.clone()) {
                return Ok(message.value());
            }
        }
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")] with a string literal",
        ));
    }

    Err(syn::Error::new_spanned(
        variant,
        "every variant needs an #[error(\"...\")] message",
    ))
}

/// Rewrites `{0}`, `{1}` placeholders to the bound field names.
fn positional_to_named(message: &str, count: usize) -> String {
    let mut rewritten = message.to_string();
    for index in (0..count).rev() {
        rewritten = rewritten.replace(&format!("{{{}}}", index), &format!("{{field{}}}", index));
    }
    rewritten
}
