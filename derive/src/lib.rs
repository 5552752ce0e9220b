use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use proc_macro_crate::FoundCrate;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Path};

#[proc_macro_derive(Attributes, attributes(zkattest))]
pub fn derive_attributes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Path to the `zkattest` crate, either given by `#[zkattest(crate_path = "..")]` or found in the
/// dependencies of the crate being compiled.
fn crate_path(input: &DeriveInput) -> syn::Result<Path> {
    let mut path = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("zkattest")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate_path") {
                path = Some(meta.value()?.parse::<LitStr>()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported zkattest attribute"))
            }
        })?;
    }
    if let Some(path) = path {
        return Ok(path);
    }

    match proc_macro_crate::crate_name("zkattest") {
        Ok(FoundCrate::Itself) => Ok(syn::parse_quote!(crate)),
        Ok(FoundCrate::Name(name)) => {
            let ident = syn::Ident::new(&name, Span::call_site());
            Ok(syn::parse_quote!(::#ident))
        }
        Err(_) => Err(syn::Error::new(
            Span::call_site(),
            "zkattest must be a direct dependency",
        )),
    }
}

/// Label of a field: `#[zkattest(label = "..")]` if given, the field name otherwise.
fn field_label(field: &syn::Field) -> syn::Result<String> {
    let mut label = None;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("zkattest")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("label") {
                label = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported zkattest attribute"))
            }
        })?;
    }
    match (label, &field.ident) {
        (Some(label), _) => Ok(label),
        (None, Some(ident)) => Ok(ident.to_string()),
        (None, None) => Err(syn::Error::new_spanned(field, "field must be named")),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let zkattest = crate_path(&input)?;
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "only structs with named fields are supported",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "only structs are supported",
            ))
        }
    };
    if fields.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "empty structs carry no attributes",
        ));
    }

    let field_names: Vec<_> = fields.iter().filter_map(|f| f.ident.as_ref()).collect();
    let field_types: Vec<_> = fields.iter().map(|f| &f.ty).collect();
    let field_labels = fields
        .iter()
        .map(field_label)
        .collect::<syn::Result<Vec<_>>>()?;
    let indices: Vec<usize> = (0..field_names.len()).collect();

    let typed_value_impl = quote! {
        impl #impl_generics #zkattest::attributes::TypedValue for #struct_name #ty_generics
            #where_clause
        {
            fn data_type() -> #zkattest::value::DataType {
                #zkattest::value::DataType::record([
                    #((
                        #field_labels,
                        <#field_types as #zkattest::attributes::TypedValue>::data_type(),
                    ),)*
                ])
            }

            fn to_value(&self) -> #zkattest::value::Value {
                #zkattest::value::Value::record([
                    #((
                        #field_labels,
                        #zkattest::attributes::TypedValue::to_value(&self.#field_names),
                    ),)*
                ])
            }
        }
    };

    let attributes_impl = quote! {
        impl #impl_generics #zkattest::attributes::Attributes for #struct_name #ty_generics
            #where_clause
        {
            fn label_at(i: usize) -> Option<&'static str> {
                match i {
                    #(#indices => Some(#field_labels),)*
                    _ => None,
                }
            }
        }
    };

    Ok(quote! {
        #typed_value_impl
        #attributes_impl
    })
}
