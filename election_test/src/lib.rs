use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Wrap a test in a freshly wired election, inject dependencies, and report
/// the emitted events if the test panics.
///
/// Injectable dependencies are [`crate::system::ElectionSystem`],
/// [`crate::clock::ManualClock`] and [`crate::model::event::EventLog`].
/// All three share state: advancing the injected clock moves the system's
/// time, and the event log records everything the system emits.
///
/// An optional argument moves the election forward before the test body runs:
/// `started` registers the example voters, adds the example candidates, and
/// opens the voting window; `closed` additionally ends the election.
#[proc_macro_attribute]
pub fn election_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected arguments and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the body so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_body", name);
    item_fn.sig.ident = new_name.clone();

    // Advance the election if requested.
    let maybe_advance = match parse_macro_input!(args as Option<Ident>) {
        None => TokenStream2::new(),
        Some(arg) if arg == "started" => quote! {
            system.start_example(&clock);
        },
        Some(arg) if arg == "closed" => quote! {
            system.start_example(&clock);
            system.close_example(&clock);
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `started`, `closed` or no argument")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            fn setup() -> (
                crate::system::ElectionSystem,
                crate::clock::ManualClock,
                crate::model::event::EventLog,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["election_registry"],
                    None,
                    None,
                );
                let clock = crate::clock::ManualClock::example();
                let events = crate::model::event::EventLog::new();
                let system = crate::system::ElectionSystem::example(&clock, &events);

                #maybe_advance

                (system, clock, events)
            }

            /// The test itself.
            #item_fn

            // Run the setup.
            let (system, clock, events) = setup();
            let report = events.clone();
            let _ = (&system, &clock, &events);

            // Run the test, catching any panics so we can describe the state first.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                #new_name(#(#test_args),*);
            }));

            // If the test panicked, dump the event log and re-raise the panic.
            if let Err(cause) = result {
                for record in report.records() {
                    log::error!("emitted before failure: {}", record);
                }
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is synchronous, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if let Some(asyncness) = sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "Election tests are synchronous; remove `async`",
        ));
    }

    let mut has_system = false;
    let mut has_clock = false;
    let mut has_events = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        let (seen, injected, description) = if type_ident == "ElectionSystem" {
                            (&mut has_system, quote! { system }, "`ElectionSystem`")
                        } else if type_ident == "ManualClock" {
                            (&mut has_clock, quote! { clock }, "`ManualClock`")
                        } else if type_ident == "EventLog" {
                            (&mut has_events, quote! { events }, "`EventLog`")
                        } else {
                            return Err(unexpected_arg(input));
                        };
                        if *seen {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one {description}"),
                            ));
                        }
                        *seen = true;
                        args.push(injected);
                        continue;
                    }
                }
            }
        }

        return Err(unexpected_arg(input));
    }

    Ok(args)
}

fn unexpected_arg(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `system_ident: ElectionSystem`, `clock_ident: ManualClock` or `events_ident: EventLog`",
    )
}
