//! Derive macro for deterministic binary serialization.
//!
//! Generates `Encode` and `Decode` impls that sequence fields through the
//! crate's `types::encoding` module in declaration order. Enums are written
//! as a u8 tag followed by the variant's fields. Only the shapes the ledger
//! actually persists are supported: named-field structs and enums.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => struct_codec(fields),
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "BinaryCodec supports named-field structs and enums only",
                )
                .to_compile_error()
                .into()
            }
        },
        Data::Enum(data) => enum_codec(data),
        Data::Union(_) => {
            return syn::Error::new_spanned(&input, "BinaryCodec does not support unions")
                .to_compile_error()
                .into()
        }
    };

    let expanded = quote! {
        impl #impl_generics crate::types::encoding::Encode for #ident #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #ident #ty_generics #where_clause {
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    };
    expanded.into()
}

/// Named-field structs: every field encodes in declaration order and decodes
/// back in the same order.
fn struct_codec(fields: &syn::FieldsNamed) -> (TokenStream2, TokenStream2) {
    let idents: Vec<_> = fields.named.iter().map(|field| &field.ident).collect();

    let encode = quote! {
        #( crate::types::encoding::Encode::encode(&self.#idents, out); )*
    };
    let decode = quote! {
        Ok(Self {
            #( #idents: crate::types::encoding::Decode::decode(input)?, )*
        })
    };
    (encode, decode)
}

/// Enums: a u8 tag (the explicit discriminant, or previous tag + 1) followed
/// by the variant's fields, if any.
fn enum_codec(data: &syn::DataEnum) -> (TokenStream2, TokenStream2) {
    let mut encode_arms = Vec::new();
    let mut decode_arms = Vec::new();
    let mut next_tag: u8 = 0;

    for variant in &data.variants {
        let tag = variant
            .discriminant
            .as_ref()
            .map(|(_, expr)| tag_value(expr))
            .unwrap_or(next_tag);
        next_tag = tag.wrapping_add(1);

        let ident = &variant.ident;
        match &variant.fields {
            Fields::Unit => {
                encode_arms.push(quote! {
                    Self::#ident => crate::types::encoding::Encode::encode(&#tag, out),
                });
                decode_arms.push(quote! { #tag => Ok(Self::#ident), });
            }
            Fields::Named(fields) => {
                let idents: Vec<_> = fields.named.iter().map(|field| &field.ident).collect();
                encode_arms.push(quote! {
                    Self::#ident { #( #idents ),* } => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #( crate::types::encoding::Encode::encode(#idents, out); )*
                    }
                });
                decode_arms.push(quote! {
                    #tag => Ok(Self::#ident {
                        #( #idents: crate::types::encoding::Decode::decode(input)?, )*
                    }),
                });
            }
            Fields::Unnamed(fields) => {
                let bindings: Vec<_> = (0..fields.unnamed.len())
                    .map(|index| format_ident!("field{}", index))
                    .collect();
                encode_arms.push(quote! {
                    Self::#ident( #( #bindings ),* ) => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #( crate::types::encoding::Encode::encode(#bindings, out); )*
                    }
                });
                let reads = bindings.iter().map(|_| {
                    quote! { crate::types::encoding::Decode::decode(input)?, }
                });
                decode_arms.push(quote! { #tag => Ok(Self::#ident( #( #reads )* )), });
            }
        }
    }

    let encode = quote! {
        match self {
            #( #encode_arms )*
        }
    };
    let decode = quote! {
        let tag: u8 = crate::types::encoding::Decode::decode(input)?;
        match tag {
            #( #decode_arms )*
            _ => Err(crate::types::encoding::DecodeError::InvalidValue),
        }
    };
    (encode, decode)
}

/// Explicit discriminants must be plain u8 literals.
fn tag_value(expr: &syn::Expr) -> u8 {
    if let syn::Expr::Lit(lit) = expr {
        if let syn::Lit::Int(int) = &lit.lit {
            if let Ok(value) = int.base10_parse::<u8>() {
                return value;
            }
        }
    }
    panic!("enum discriminants must be u8 literals");
}
