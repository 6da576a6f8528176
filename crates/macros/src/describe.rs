use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, parse_macro_input, parse_quote};

pub fn derive_describe(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	match expand(input) {
		Ok(tokens) => tokens.into(),
		Err(e) => e.to_compile_error().into(),
	}
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
	if let Some(attr) = find_prism(&input.attrs) {
		return Err(syn::Error::new_spanned(attr, "#[prism(...)] is only allowed on struct fields"));
	}
	if let Some(lifetime) = input.generics.lifetimes().next() {
		return Err(syn::Error::new_spanned(
			lifetime,
			"Describe requires a 'static type; lifetime parameters are not supported",
		));
	}

	match &input.data {
		Data::Struct(data) => validate_fields(&data.fields)?,
		Data::Enum(data) => {
			for variant in &data.variants {
				if let Some(attr) = find_prism(&variant.attrs) {
					return Err(syn::Error::new_spanned(
						attr,
						"#[prism(...)] is not supported on enum variants",
					));
				}
				if !matches!(variant.fields, Fields::Unit) {
					return Err(syn::Error::new_spanned(
						variant,
						"Describe only supports fieldless enums",
					));
				}
			}
		}
		Data::Union(data) => {
			return Err(syn::Error::new_spanned(
				data.union_token,
				"Describe cannot be derived for unions",
			));
		}
	}

	let name = &input.ident;
	let mut generics = input.generics.clone();
	let params: Vec<_> = generics.type_params().map(|p| p.ident.clone()).collect();
	let where_clause = generics.make_where_clause();
	for param in params {
		where_clause.predicates.push(parse_quote!(#param: 'static));
	}
	let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

	Ok(quote! {
		impl #impl_generics ::prism_meta::Described for #name #ty_generics #where_clause {}
	})
}

fn find_prism(attrs: &[Attribute]) -> Option<&Attribute> {
	attrs.iter().find(|a| a.path().is_ident("prism"))
}

fn validate_fields(fields: &Fields) -> syn::Result<()> {
	for field in fields {
		let mut skip = false;
		let mut readonly = false;
		for attr in field.attrs.iter().filter(|a| a.path().is_ident("prism")) {
			attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("skip") {
					skip = true;
					Ok(())
				} else if meta.path.is_ident("readonly") {
					readonly = true;
					Ok(())
				} else {
					Err(meta.error("unknown prism attribute; expected `skip` or `readonly`"))
				}
			})?;
		}
		if skip && readonly {
			return Err(syn::Error::new_spanned(
				field,
				"`skip` and `readonly` are mutually exclusive",
			));
		}
	}
	Ok(())
}
