use std::{collections::VecDeque, sync::Arc};

use crate::{
    any::{Object, TypeInfo},
    errors::ResolveErrorKind,
};

/// Dependency slot of a constructor, described up front so plans can be made without building anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub(crate) service_type: TypeInfo,
    pub(crate) optional: bool,
    /// Receives the instance being decorated instead of a graph lookup.
    pub(crate) decorated: bool,
}

impl Parameter {
    #[inline]
    #[must_use]
    pub(crate) fn required(service_type: TypeInfo) -> Self {
        Self {
            service_type,
            optional: false,
            decorated: false,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn optional(service_type: TypeInfo) -> Self {
        Self {
            service_type,
            optional: true,
            decorated: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &TypeInfo {
        &self.service_type
    }

    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Built values for each parameter, in declaration order. Absent optional values are `None`.
pub struct Arguments {
    values: VecDeque<Option<Object>>,
    index: usize,
}

impl Arguments {
    #[inline]
    #[must_use]
    pub(crate) fn new(values: impl IntoIterator<Item = Option<Object>>) -> Self {
        Self {
            values: values.into_iter().collect(),
            index: 0,
        }
    }

    pub(crate) fn next(&mut self, expected: TypeInfo) -> Result<Option<Object>, ResolveErrorKind> {
        let index = self.index;
        self.index += 1;
        self.values
            .pop_front()
            .ok_or(ResolveErrorKind::MissingArgument { index, expected })
    }

    pub fn take<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ResolveErrorKind> {
        let index = self.index;
        match self.next(TypeInfo::of::<T>())? {
            Some(object) => downcast(object),
            None => Err(ResolveErrorKind::MissingArgument {
                index,
                expected: TypeInfo::of::<T>(),
            }),
        }
    }

    pub fn take_optional<T: Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.next(TypeInfo::of::<T>())?.map(downcast).transpose()
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(object: Object) -> Result<Arc<T>, ResolveErrorKind> {
    object.downcast::<T>().map_err(|object| ResolveErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
        actual: (*object).type_id(),
    })
}

/// Something a constructor can ask for.
///
/// Implementors describe their parameters for planning and pull their values
/// back out of the built [`Arguments`] in the same order.
pub trait DependencyResolver: Sized + Send + 'static {
    fn parameters(parameters: &mut Vec<Parameter>);

    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind>;
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            #[inline]
            fn parameters(parameters: &mut Vec<Parameter>) {
                $( $ty::parameters(parameters); )*
            }

            #[inline]
            fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
                Ok(($($ty::extract(arguments)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[must_use]
pub(crate) fn parameters_of<Deps: DependencyResolver>() -> Vec<Parameter> {
    let mut parameters = Vec::new();
    Deps::parameters(&mut parameters);
    parameters
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{parameters_of, Arguments, DependencyResolver, Parameter};
    use crate::{any::TypeInfo, errors::ResolveErrorKind, inject::Inject};

    struct Config(u8);
    struct Logger;

    #[test]
    #[allow(dead_code)]
    fn test_dependency_resolver_impls() {
        fn resolver<T: DependencyResolver>() {}
        fn resolver_with_dep<Dep: Send + Sync + 'static>() {
            resolver::<Inject<Dep>>();
            resolver::<Option<Inject<Dep>>>();
            resolver::<(Inject<Dep>, Option<Inject<Dep>>)>();
        }
    }

    #[test]
    fn test_parameters_in_declaration_order() {
        let parameters = parameters_of::<(Inject<Config>, Option<Inject<Logger>>)>();

        assert_eq!(
            parameters,
            vec![
                Parameter::required(TypeInfo::of::<Config>()),
                Parameter::optional(TypeInfo::of::<Logger>()),
            ]
        );
    }

    #[test]
    fn test_extract() {
        let mut arguments = Arguments::new([Some(Arc::new(Config(3)) as _), None]);

        let (Inject(config), logger) = <(Inject<Config>, Option<Inject<Logger>>)>::extract(&mut arguments).unwrap();

        assert_eq!(config.0, 3);
        assert!(logger.is_none());
    }

    #[test]
    fn test_extract_errors() {
        let mut arguments = Arguments::new([Some(Arc::new(Logger) as _)]);
        assert!(matches!(
            Inject::<Config>::extract(&mut arguments),
            Err(ResolveErrorKind::IncorrectType { .. })
        ));

        let mut arguments = Arguments::new([]);
        assert!(matches!(
            Inject::<Config>::extract(&mut arguments),
            Err(ResolveErrorKind::MissingArgument { index: 0, .. })
        ));
    }
}
