//! `#[modkit::module(...)]` — attribute macro that turns a plain struct into
//! a module discoverable by `ModuleRegistry::discover_and_build()`.
//!
//! Usage:
//! ```ignore
//! #[modkit::module(name = "tasks", caps = [rest], deps = ["api_ingress"])]
//! #[derive(Default)]
//! pub struct TasksModule { ... }
//! ```
//!
//! The struct must implement `Module`, plus whichever trait each declared
//! capability requires (`RestfulModule` for `rest`, `RestHostModule` for
//! `rest_host`, `DbModule` for `db`, `StatefulModule` for `stateful`), and
//! must implement `Default` so the macro can construct one instance per
//! capability to upcast into the matching trait object.
//!
//! `lifecycle(...)` is accepted for readability at the call site (it
//! documents which method drives a `stateful` module's `start`) but carries
//! no runtime behavior of its own — the struct still hand-writes its
//! `StatefulModule` impl.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parenthesized,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
    FnArg, Ident, ImplItem, ItemImpl, ItemStruct, LitBool, LitStr, Pat, Token,
};

struct ModuleArgs {
    name: LitStr,
    caps: Vec<Ident>,
    deps: Vec<LitStr>,
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name: Option<LitStr> = None;
        let mut caps: Vec<Ident> = Vec::new();
        let mut deps: Vec<LitStr> = Vec::new();

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            let key_str = key.to_string();

            if key_str == "lifecycle" {
                // lifecycle(entry = "...", stop_timeout = "...", await_ready)
                let content;
                parenthesized!(content in input);
                // Swallow the token tree; it's documentation-only for the registry.
                let _: TokenStream2 = content.parse()?;
            } else {
                input.parse::<Token![=]>()?;
                match key_str.as_str() {
                    "name" => {
                        name = Some(input.parse()?);
                    }
                    "caps" => {
                        let content;
                        syn::bracketed!(content in input);
                        let idents =
                            Punctuated::<Ident, Token![,]>::parse_terminated(&content)?;
                        caps = idents.into_iter().collect();
                    }
                    "deps" => {
                        let content;
                        syn::bracketed!(content in input);
                        let lits =
                            Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                        deps = lits.into_iter().collect();
                    }
                    other => {
                        return Err(syn::Error::new(
                            key.span(),
                            format!("unknown `modkit::module` argument `{other}`"),
                        ))
                    }
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        let name = name
            .ok_or_else(|| syn::Error::new(proc_macro2::Span::call_site(), "missing `name = \"...\"`"))?;

        Ok(ModuleArgs { name, caps, deps })
    }
}

#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ModuleArgs);
    let item_struct = parse_macro_input!(item as ItemStruct);
    let ty = &item_struct.ident;

    let name_lit = &args.name;
    let deps_lits = &args.deps;

    let mut cap_registrations = Vec::<TokenStream2>::new();
    for cap in &args.caps {
        let cap_str = cap.to_string();
        let reg = match cap_str.as_str() {
            "rest" => quote! {
                let rest: ::std::sync::Arc<dyn ::modkit::contracts::RestfulModule> =
                    ::std::sync::Arc::new(<#ty as ::std::default::Default>::default());
                b.register_rest_with_meta(#name_lit, rest);
            },
            "rest_host" => quote! {
                let rest_host: ::std::sync::Arc<dyn ::modkit::contracts::RestHostModule> =
                    ::std::sync::Arc::new(<#ty as ::std::default::Default>::default());
                b.register_rest_host_with_meta(#name_lit, rest_host);
            },
            "db" => quote! {
                let db: ::std::sync::Arc<dyn ::modkit::contracts::DbModule> =
                    ::std::sync::Arc::new(<#ty as ::std::default::Default>::default());
                b.register_db_with_meta(#name_lit, db);
            },
            "stateful" => quote! {
                let stateful: ::std::sync::Arc<dyn ::modkit::contracts::StatefulModule> =
                    ::std::sync::Arc::new(<#ty as ::std::default::Default>::default());
                b.register_stateful_with_meta(#name_lit, stateful);
            },
            other => {
                return syn::Error::new(
                    cap.span(),
                    format!("unknown capability `{other}`; expected one of rest, rest_host, db, stateful"),
                )
                .to_compile_error()
                .into()
            }
        };
        cap_registrations.push(reg);
    }

    let register_fn_name = quote::format_ident!(
        "__modkit_register_{}",
        ty.to_string().to_lowercase()
    );

    let expanded = quote! {
        #item_struct

        #[doc(hidden)]
        fn #register_fn_name(b: &mut ::modkit::registry::RegistryBuilder) {
            let core: ::std::sync::Arc<dyn ::modkit::contracts::Module> =
                ::std::sync::Arc::new(<#ty as ::std::default::Default>::default());
            b.register_core_with_meta(#name_lit, &[#(#deps_lits),*], core);
            #(#cap_registrations)*
        }

        ::modkit::inventory::submit! {
            ::modkit::registry::Registrator(#register_fn_name)
        }
    };

    expanded.into()
}

// ---------------------------------------------------------------------------
// #[modkit::lifecycle(method = "...", stop_timeout = "...", await_ready = true)]
// ---------------------------------------------------------------------------
//
// Applied to an inherent `impl Type { ... }` block. Generates a `Runnable`
// impl that dispatches to the named method, plus an `into_module()` helper
// that wraps `Type` in `WithLifecycle<Type>` configured per the attribute.

struct LifecycleArgs {
    method: LitStr,
    stop_timeout: Option<LitStr>,
    await_ready: bool,
}

impl Parse for LifecycleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut method: Option<LitStr> = None;
        let mut stop_timeout: Option<LitStr> = None;
        let mut await_ready = false;

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "method" => method = Some(input.parse()?),
                "stop_timeout" => stop_timeout = Some(input.parse()?),
                "await_ready" => {
                    let lit: LitBool = input.parse()?;
                    await_ready = lit.value;
                }
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("unknown `modkit::lifecycle` argument `{other}`"),
                    ))
                }
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        let method = method.ok_or_else(|| {
            syn::Error::new(proc_macro2::Span::call_site(), "missing `method = \"...\"`")
        })?;

        Ok(LifecycleArgs {
            method,
            stop_timeout,
            await_ready,
        })
    }
}

/// True if the named method's parameter list (after `self`) ends in a
/// `ReadySignal`-typed parameter.
fn method_takes_ready_signal(item_impl: &ItemImpl, method_name: &str) -> bool {
    for item in &item_impl.items {
        if let ImplItem::Fn(f) = item {
            if f.sig.ident == method_name {
                if let Some(FnArg::Typed(pat_type)) = f.sig.inputs.iter().last() {
                    if let Pat::Ident(_) = pat_type.pat.as_ref() {
                        let ty_str = quote!(#pat_type.ty).to_string();
                        return ty_str.contains("ReadySignal");
                    }
                }
            }
        }
    }
    false
}

#[proc_macro_attribute]
pub fn lifecycle(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as LifecycleArgs);
    let item_impl = parse_macro_input!(item as ItemImpl);
    let ty = item_impl.self_ty.clone();

    let method_lit = &args.method;
    let method_ident = Ident::new(&method_lit.value(), method_lit.span());
    let has_ready_handler = method_takes_ready_signal(&item_impl, &method_lit.value());
    let await_ready = args.await_ready;

    let run_impl = if has_ready_handler {
        quote! {
            #[::modkit::async_trait]
            impl ::modkit::lifecycle::Runnable for #ty {
                async fn run(
                    self: ::std::sync::Arc<Self>,
                    cancel: ::tokio_util::sync::CancellationToken,
                ) -> ::modkit::Result<()> {
                    let (tx, _rx) = ::tokio::sync::oneshot::channel();
                    let ready = ::modkit::lifecycle::ReadySignal::from_sender(tx);
                    self.#method_ident(cancel, ready).await
                }
            }
        }
    } else {
        quote! {
            #[::modkit::async_trait]
            impl ::modkit::lifecycle::Runnable for #ty {
                async fn run(
                    self: ::std::sync::Arc<Self>,
                    cancel: ::tokio_util::sync::CancellationToken,
                ) -> ::modkit::Result<()> {
                    self.#method_ident(cancel).await
                }
            }
        }
    };

    let run_ready_fn = if has_ready_handler {
        quote! {
            Some({
                fn __run_ready(
                    inner: ::std::sync::Arc<#ty>,
                    cancel: ::tokio_util::sync::CancellationToken,
                    ready: ::modkit::lifecycle::ReadySignal,
                ) -> ::std::pin::Pin<::std::boxed::Box<dyn ::std::future::Future<Output = ::modkit::Result<()>> + Send>> {
                    ::std::boxed::Box::pin(async move { inner.#method_ident(cancel, ready).await })
                }
                __run_ready
            })
        }
    } else {
        quote! { None }
    };

    let stop_timeout_call = match &args.stop_timeout {
        Some(lit) => quote! {
            let w = w.with_stop_timeout(::humantime::parse_duration(#lit).expect("invalid stop_timeout"));
        },
        None => quote! {},
    };

    let expanded = quote! {
        #item_impl

        #run_impl

        impl #ty {
            /// Wrap `self` into a `StatefulModule` driven by modkit's lifecycle controller.
            pub fn into_module(self) -> ::modkit::lifecycle::WithLifecycle<#ty> {
                let w = ::modkit::lifecycle::WithLifecycle::new(self)
                    .with_ready_mode(#await_ready, #has_ready_handler, #run_ready_fn);
                #stop_timeout_call
                w
            }
        }
    };

    expanded.into()
}
