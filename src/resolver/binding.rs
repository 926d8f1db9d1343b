//! Parameter binding and strategy-aware instantiation.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use super::Resolver;
use crate::arg_resolver::ArgResolverOptions;
use crate::callable::{AnyArc, BoundArgs, CallArgs, Injectable, ParamKind, Parameter, Signature};
use crate::hooks::{self, ErasedHook};
use crate::error::{DiError, DiResult, ParamSite};
use crate::internal::CircularGuard;
use crate::registry::RegisteredType;
use crate::strategy::Strategy;
use crate::types::{GenericMeta, ParseOptions, TypeDescriptor, TypeExpr, TypeRef, TypeVarLookup};

/// One callable about to be bound.
pub(super) struct Binding<'a> {
    pub(super) callable: &'a str,
    pub(super) signature: &'a Signature,
    pub(super) positional: &'a [AnyArc],
    pub(super) named: &'a IndexMap<String, AnyArc>,
    /// Symbols of the type being constructed
    pub(super) lookup: Option<&'a TypeVarLookup>,
    /// Type being constructed and its strategy
    pub(super) caller: Option<(&'a TypeDescriptor, Strategy)>,
}

/// `'Name'` or `'Name' | None`.
pub(super) fn forward_name(expr: &TypeExpr) -> Option<(Arc<str>, bool)> {
    match expr {
        TypeExpr::Forward(name) => Some((name.clone(), false)),
        TypeExpr::Union(_) => {
            let members = expr.members();
            let mut concrete = members.iter().filter(|m| !matches!(m, TypeExpr::None));
            match (concrete.next().copied(), concrete.next()) {
                (Some(TypeExpr::Forward(name)), None) => Some((name.clone(), expr.is_nullable())),
                _ => None,
            }
        }
        _ => None,
    }
}

impl Resolver {
    pub(super) fn bind_args(&self, binding: &Binding<'_>, guard: &mut CircularGuard) -> DiResult<BoundArgs> {
        let params = binding.signature.params();
        if let Some(p) = params
            .iter()
            .find(|p| matches!(p.param_kind(), ParamKind::PositionalOnly | ParamKind::VarPositional))
        {
            return Err(DiError::NoPositionalParameter {
                callable: binding.callable.to_string(),
                param: p.name().to_string(),
            });
        }

        let mut bound = BoundArgs::new(Arc::from(binding.callable));
        let given = binding.positional.len() + binding.named.len();

        let slots: Vec<&Parameter> = params
            .iter()
            .filter(|p| p.param_kind() == ParamKind::PositionalOrKeyword)
            .collect();
        if binding.positional.len() > slots.len() {
            return Err(DiError::InvalidArgCount {
                callable: binding.callable.to_string(),
                expected: slots.len(),
                given: binding.positional.len(),
            });
        }
        for (param, value) in slots.iter().zip(binding.positional) {
            bound.insert(param.name_arc(), Some(value.clone()));
        }

        let catch_all = params.iter().any(|p| p.param_kind() == ParamKind::VarKeyword);
        let accepted = params
            .iter()
            .filter(|p| p.param_kind() != ParamKind::VarKeyword)
            .count();
        for (name, value) in binding.named {
            let target = params.iter().find(|p| {
                p.name() == name
                    && matches!(p.param_kind(), ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly)
            });
            match target {
                Some(param) if !bound.is_bound(param.name()) => {
                    bound.insert(param.name_arc(), Some(value.clone()));
                }
                None if catch_all => bound.insert_kwarg(name.clone(), value.clone()),
                _ => {
                    return Err(DiError::InvalidArgCount {
                        callable: binding.callable.to_string(),
                        expected: accepted,
                        given,
                    })
                }
            }
        }

        for param in params {
            if param.param_kind() == ParamKind::VarKeyword || bound.is_bound(param.name()) {
                continue;
            }
            let value = self.resolve_param(binding, param, guard)?;
            bound.insert(param.name_arc(), value);
        }
        Ok(bound)
    }

    fn resolve_param(
        &self,
        binding: &Binding<'_>,
        param: &Parameter,
        guard: &mut CircularGuard,
    ) -> DiResult<Option<AnyArc>> {
        let site = || ParamSite::new(binding.callable, param.name());

        let Some(annotation) = param.annotation() else {
            return param
                .default_value()
                .ok_or_else(|| DiError::AnnotationMissing { site: site() });
        };

        if let Some((name, nullable)) = forward_name(annotation) {
            let descriptor = self.literal_match(&name, Some(site()))?.with_nullable(nullable);
            return self.resolve_descriptor_param(binding, param, &descriptor, guard);
        }

        if annotation.non_null_arity() >= 2 {
            return Err(DiError::UnionNotAllowed {
                type_name: annotation.to_string(),
                site: Some(site()),
            });
        }

        let mut options = ParseOptions::new();
        if let Some(lookup) = binding.lookup {
            options = options.lookup(lookup);
        }
        if !self.config().strict_type_vars {
            options = options.tolerate_type_vars();
        }

        match TypeDescriptor::parse(annotation, options)? {
            TypeRef::Resolved(descriptor) if descriptor.is_union() => Err(DiError::UnionNotAllowed {
                type_name: descriptor.to_string(),
                site: Some(site()),
            }),
            TypeRef::Resolved(descriptor) if !descriptor.has_unresolved_args() => {
                self.resolve_descriptor_param(binding, param, &descriptor, guard)
            }
            _ => match param.default_value() {
                Some(default) => Ok(default),
                None if annotation.is_nullable() => Ok(None),
                None => Err(DiError::typing(
                    format!("{} cannot be injected, it is not a concrete type", annotation),
                    Some(site().to_string()),
                )),
            },
        }
    }

    fn resolve_descriptor_param(
        &self,
        binding: &Binding<'_>,
        param: &Parameter,
        descriptor: &TypeDescriptor,
        guard: &mut CircularGuard,
    ) -> DiResult<Option<AnyArc>> {
        let options = ArgResolverOptions {
            resolver: self,
            caller: binding.caller.map(|(t, _)| t),
            caller_strategy: binding.caller.map(|(_, s)| s),
            callable: binding.callable,
            name: param.name(),
            descriptor,
            nullable: descriptor.is_nullable(),
            has_default: param.has_default(),
        };
        if let Some(arg_resolver) = self.shared.chain.find(&options, self.is_session()) {
            tracing::trace!(
                callable = binding.callable,
                param = param.name(),
                r#type = %descriptor,
                "argument served by resolver chain"
            );
            return arg_resolver.resolve(&options).map(Some);
        }

        if self.shared.registry.is_registered(descriptor) {
            return self.resolve_descriptor(descriptor, guard).map(Some);
        }
        if let Some(bound) = self.context.get(&descriptor.key()) {
            return Ok(Some(bound));
        }
        if descriptor.is_nullable() {
            return Ok(None);
        }
        if let Some(default) = param.default_value() {
            return Ok(default);
        }
        Err(DiError::TypeNotRegistered {
            type_name: descriptor.key().to_string(),
            site: Some(ParamSite::new(binding.callable, param.name())),
        })
    }

    pub(super) fn literal_match(&self, name: &str, site: Option<ParamSite>) -> DiResult<TypeDescriptor> {
        let matches = self.shared.registry.literal_matches(name);
        match matches.as_slice() {
            [] => Err(DiError::NoLiteralMatch {
                name: name.to_string(),
                site,
            }),
            [single] => Ok(single.descriptor.clone()),
            many => Err(DiError::TooManyLiteralMatch {
                name: name.to_string(),
                candidates: many.iter().map(|r| r.descriptor.to_string()).collect(),
                site,
            }),
        }
    }

    /// Instance for `requested`, honoring its registration's strategy.
    pub(super) fn resolve_descriptor(&self, requested: &TypeDescriptor, guard: &mut CircularGuard) -> DiResult<AnyArc> {
        let Some(registration) = self.shared.registry.find(requested) else {
            // not registered, but possibly bound into the context
            return self
                .context
                .get(&requested.key())
                .ok_or_else(|| DiError::TypeNotRegistered {
                    type_name: requested.key().to_string(),
                    site: None,
                });
        };
        let key = registration.cache_key(requested);
        // before any slot is touched: a slot held by this call tree would block
        guard.check(&key)?;

        match registration.strategy {
            Strategy::Singleton => self.resolve_singleton(registration, &key, guard),
            Strategy::Scoped => self.resolve_scoped(registration, &key, guard),
            Strategy::Transient => guard.enter(&key, Strategy::Transient, |guard| {
                self.build(registration, &key, guard)
            }),
        }
    }

    fn resolve_singleton(
        &self,
        registration: &RegisteredType,
        key: &TypeDescriptor,
        guard: &mut CircularGuard,
    ) -> DiResult<AnyArc> {
        if let Some(instance) = &registration.instance {
            return Ok(instance.clone());
        }
        let slot = self.shared.root.slot(key);
        guard.enter(key, Strategy::Singleton, |guard| {
            let mut cell = slot.lock();
            if let Some(instance) = cell.as_ref() {
                tracing::trace!(r#type = %key, "singleton cache hit");
                return Ok(instance.clone());
            }
            // dependencies of a singleton never see the caller's session
            let instance = self.root().build(registration, key, guard)?;
            *cell = Some(instance.clone());
            Ok(instance)
        })
    }

    fn resolve_scoped(
        &self,
        registration: &RegisteredType,
        key: &TypeDescriptor,
        guard: &mut CircularGuard,
    ) -> DiResult<AnyArc> {
        if let Some(singleton) = guard.nearest_singleton() {
            return Err(DiError::ScopedInNonScoped {
                type_name: key.to_string(),
                caller: singleton.to_string(),
                strategy: Strategy::Singleton.as_str(),
            });
        }
        if !self.is_session() {
            return Err(match guard.caller() {
                None => DiError::ScopedOutsideSession {
                    type_name: key.to_string(),
                },
                Some((caller, strategy)) => DiError::ScopedInNonScoped {
                    type_name: key.to_string(),
                    caller: caller.to_string(),
                    strategy: strategy.as_str(),
                },
            });
        }

        let slot = self.context.slot(key);
        guard.enter(key, Strategy::Scoped, |guard| {
            let mut cell = slot.lock();
            if let Some(instance) = cell.as_ref() {
                tracing::trace!(r#type = %key, "scoped cache hit");
                return Ok(instance.clone());
            }
            let instance = self.build(registration, key, guard)?;
            *cell = Some(instance.clone());
            Ok(instance)
        })
    }

    /// Constructs one instance and reports it to the observers.
    fn build(&self, registration: &RegisteredType, key: &TypeDescriptor, guard: &mut CircularGuard) -> DiResult<AnyArc> {
        let observers = &self.shared.registry.observers;
        let strategy = registration.strategy;
        let started = Instant::now();
        if observers.has_observers() {
            observers.resolving(key, strategy);
        }

        match self.construct(registration, key, guard) {
            Ok(instance) => {
                tracing::debug!(r#type = %key, strategy = strategy.as_str(), "instance built");
                if observers.has_observers() {
                    observers.resolved(key, strategy, started.elapsed());
                }
                Ok(instance)
            }
            Err(error) => {
                tracing::warn!(r#type = %key, error = %error, "build failed");
                observers.failed(key, &error);
                Err(error)
            }
        }
    }

    fn construct(&self, registration: &RegisteredType, key: &TypeDescriptor, guard: &mut CircularGuard) -> DiResult<AnyArc> {
        let factory = registration
            .factory
            .as_ref()
            .ok_or_else(|| DiError::InvalidRegistration {
                type_name: key.to_string(),
                reason: "no factory to build from".into(),
            })?;
        let lookup = key.lookup();
        let caller = Some((key, registration.strategy));

        let mut args = self.bind_args(
            &Binding {
                callable: factory.name(),
                signature: factory.signature(),
                positional: &registration.args,
                named: &registration.named_args,
                lookup: Some(&lookup),
                caller,
            },
            guard,
        )?;
        let meta = (!key.origin().params().is_empty()).then(|| GenericMeta::new(key.args_arc()));
        if let Some(meta) = &meta {
            args.set_generic_meta(meta.clone());
        }

        let mut value = factory.invoke(args)?;
        self.run_hooks(&registration.hooks, &mut *value, &lookup, caller, guard)?;

        let instance: AnyArc = Arc::from(value);
        if let Some(meta) = meta {
            self.context.tag(&instance, meta);
        }
        Ok(instance)
    }

    /// Runs already ordered hooks on `target`, injecting each one's parameters.
    pub(super) fn run_hooks(
        &self,
        hooks: &[ErasedHook],
        target: &mut (dyn Any + Send + Sync),
        lookup: &TypeVarLookup,
        caller: Option<(&TypeDescriptor, Strategy)>,
        guard: &mut CircularGuard,
    ) -> DiResult<()> {
        let no_named = IndexMap::new();
        for hook in hooks {
            let hook_args = self.bind_args(
                &Binding {
                    callable: &hook.name,
                    signature: &hook.signature,
                    positional: &[],
                    named: &no_named,
                    lookup: Some(lookup),
                    caller,
                },
                guard,
            )?;
            hook.run(target, hook_args)?;
        }
        Ok(())
    }

    /// Binds and runs `T`'s constructor, then its own hooks. Nothing is
    /// looked up in the registry for `T` itself and nothing is cached.
    pub(super) fn build_unregistered<T: Injectable>(&self, args: &CallArgs, guard: &mut CircularGuard) -> DiResult<T> {
        let descriptor = TypeDescriptor::of_injectable::<T>();
        let lookup = descriptor.lookup();
        let constructor = T::constructor();
        let mut own_hooks: Vec<ErasedHook> = T::init_hooks().into_iter().map(|h| h.erase(0)).collect();
        hooks::order(&mut own_hooks);

        guard.enter(&descriptor, Strategy::Transient, |guard| {
            let caller = Some((&descriptor, Strategy::Transient));
            let mut bound = self.bind_args(
                &Binding {
                    callable: constructor.name(),
                    signature: constructor.signature(),
                    positional: args.positional(),
                    named: args.named_args(),
                    lookup: Some(&lookup),
                    caller,
                },
                guard,
            )?;
            if !descriptor.origin().params().is_empty() {
                bound.set_generic_meta(GenericMeta::new(descriptor.args_arc()));
            }
            let mut value = constructor.invoke(bound)?;
            self.run_hooks(&own_hooks, &mut value, &lookup, caller, guard)?;
            tracing::debug!(r#type = %descriptor, "instance built outside the registry");
            Ok(value)
        })
    }
}
