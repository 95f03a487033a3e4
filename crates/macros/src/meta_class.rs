//! MetaClass derive macro implementation

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::DeriveInput;

use crate::parse::{parse_meta_class, MetaClassArgs, MetaFieldArgs};

/// Generate the MetaClass implementation
pub fn derive_meta_class(input: DeriveInput) -> TokenStream {
    match parse_meta_class(&input) {
        Ok(args) => generate_impl(args),
        Err(e) => e.write_errors(),
    }
}

fn generate_impl(args: MetaClassArgs) -> TokenStream {
    let struct_name = &args.ident;
    let class_name = args.class_name();

    if !args.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &args.generics,
            "MetaClass cannot be derived for generic structs",
        )
        .to_compile_error();
    }

    let fields = match &args.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        _ => {
            return syn::Error::new_spanned(
                &args.ident,
                "MetaClass can only be derived for structs",
            )
            .to_compile_error()
        }
    };

    let bases: Vec<&MetaFieldArgs> = fields.iter().filter(|f| f.base).collect();
    let extends: Vec<&MetaFieldArgs> = fields.iter().filter(|f| f.extends).collect();

    let (base_expr, super_object, super_class) = match (bases.as_slice(), extends.as_slice()) {
        ([base], []) => {
            let ident = &base.ident;
            (quote! { &self.#ident }, quote! {}, quote! {})
        }
        ([], [parent]) => {
            let ident = &parent.ident;
            let ty = &parent.ty;
            (
                quote! { ::metaplug_core::object::Object::base(&self.#ident) },
                quote! {
                    fn super_object(&self) -> ::std::option::Option<&dyn ::metaplug_core::object::Object> {
                        ::std::option::Option::Some(&self.#ident)
                    }
                },
                quote! { .super_class(<#ty>::static_meta_object) },
            )
        }
        _ => {
            return syn::Error::new_spanned(
                &args.ident,
                "MetaClass needs exactly one `#[meta(base)]` or `#[meta(extends)]` field",
            )
            .to_compile_error()
        }
    };

    let properties: Vec<&MetaFieldArgs> = fields.iter().filter(|f| f.property).collect();

    let accessors: Vec<_> = properties.iter().map(|f| generate_accessors(f)).collect();
    let property_builders: Vec<_> = properties
        .iter()
        .map(|f| generate_property_builder(struct_name, f))
        .collect();

    // one signal per distinct notify signature
    let mut notify_signals: Vec<&str> = Vec::new();
    for field in &properties {
        if let Some(notify) = field.notify.as_deref() {
            if !notify_signals.contains(&notify) {
                notify_signals.push(notify);
            }
        }
    }

    let class_info = args.class_info.0.iter().map(|(name, value)| {
        quote! { .class_info(#name, #value) }
    });

    let factory = if args.constructible {
        quote! {
            .factory(|| {
                ::metaplug_core::object::new_object(
                    <#struct_name as ::std::default::Default>::default(),
                )
            })
        }
    } else {
        quote! {}
    };

    let extra_methods = match &args.methods {
        Some(path) => quote! { let builder = #path(builder); },
        None => quote! {},
    };

    quote! {
        impl #struct_name {
            /// Class name of the meta object
            pub const CLASS_NAME: &'static str = #class_name;

            /// The class descriptor, built on first use
            pub fn static_meta_object() -> &'static ::metaplug_core::meta::MetaObject {
                static META: ::std::sync::OnceLock<&'static ::metaplug_core::meta::MetaObject> =
                    ::std::sync::OnceLock::new();
                META.get_or_init(|| {
                    let builder = ::metaplug_core::meta::MetaObjectBuilder::for_type::<#struct_name>(#class_name)
                        #super_class
                        #(#class_info)*
                        #(.property(#property_builders))*
                        #(.method(::metaplug_core::meta::MethodBuilder::signal(#notify_signals)))*
                        #factory;
                    #extra_methods
                    builder.build()
                })
            }

            #(#accessors)*
        }

        impl ::metaplug_core::object::Object for #struct_name {
            fn meta_object(&self) -> &'static ::metaplug_core::meta::MetaObject {
                Self::static_meta_object()
            }

            fn base(&self) -> &::metaplug_core::object::ObjectBase {
                #base_expr
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            #super_object
        }
    }
}

fn value_type(field: &MetaFieldArgs) -> TokenStream {
    let ty = &field.ty;
    quote! { <#ty as ::metaplug_core::meta::PropertyCell>::Value }
}

fn generate_accessors(field: &MetaFieldArgs) -> TokenStream {
    let Some(field_ident) = field.ident.as_ref() else {
        return quote! {};
    };
    let clean_name = field.clean_name();
    let getter_name = format_ident!("{}", clean_name);
    let setter_name = format_ident!("set_{}", clean_name);
    let value_ty = value_type(field);

    let getter_doc = format!("Current value of `{}`", field.property_name());
    let getter = quote! {
        #[doc = #getter_doc]
        pub fn #getter_name(&self) -> #value_ty {
            ::metaplug_core::meta::PropertyCell::get(&self.#field_ident)
        }
    };

    if field.readonly {
        return getter;
    }

    let setter_doc = format!("Set `{}`", field.property_name());
    let store = match &field.notify {
        Some(notify) => quote! {
            if ::metaplug_core::meta::PropertyCell::replace(
                &self.#field_ident,
                ::std::clone::Clone::clone(&value),
            ) {
                ::metaplug_core::connections::emit(
                    self,
                    #notify,
                    &[::metaplug_core::variant::VariantValue::to_variant(value)],
                );
            }
        },
        None => quote! {
            ::metaplug_core::meta::PropertyCell::replace(&self.#field_ident, value);
        },
    };

    quote! {
        #getter

        #[doc = #setter_doc]
        pub fn #setter_name(&self, value: #value_ty) {
            #store
        }
    }
}

fn generate_property_builder(struct_name: &syn::Ident, field: &MetaFieldArgs) -> TokenStream {
    let property_name = field.property_name();
    let clean_name = field.clean_name();
    let getter_name = format_ident!("{}", clean_name);
    let setter_name = format_ident!("set_{}", clean_name);
    let value_ty = value_type(field);

    let write = if field.readonly {
        quote! {}
    } else {
        let setter_str = setter_name.to_string();
        quote! {
            .write(::metaplug_core::meta::write_jar(
                |object: &#struct_name, value: #value_ty| object.#setter_name(value),
            ))
            .setter_name(#setter_str)
        }
    };

    let notify = match &field.notify {
        Some(notify) => quote! { .notify(#notify) },
        None => quote! {},
    };

    let stored = if field.transient {
        quote! { .stored(::metaplug_core::meta::constant_jar(false)) }
    } else {
        quote! {}
    };

    let user = if field.user {
        quote! { .user(::metaplug_core::meta::constant_jar(true)) }
    } else {
        quote! {}
    };

    quote! {
        ::metaplug_core::meta::PropertyBuilder::new::<#value_ty>(#property_name)
            .read(::metaplug_core::meta::read_jar(|object: &#struct_name| object.#getter_name()))
            #write
            #notify
            #stored
            #user
    }
}
