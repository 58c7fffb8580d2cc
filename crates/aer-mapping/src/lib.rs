// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exception-to-status-code mapping for the API error relay.
//!
//! Application code declares its mappings in one or more [`MappingProfile`]s
//! at startup; the profiles are merged into a single immutable
//! [`ExceptionMapper`] that request handlers consult via
//! [`lookup`](ExceptionMapper::lookup). Lookup is an exact match on the
//! concrete runtime type of the exception, so a subtype never inherits its
//! parent's mapping.
//!
//! Registration failures ([`RegistrationError`]) are configuration bugs and
//! must abort startup; they are never produced on the request path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, OnceLock};

use aer_taxonomy::ApiException;
use http::StatusCode;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// A symbolic error code drawn from a closed application-defined enumeration.
///
/// The numeric code and the category name are always derived from the same
/// value, so the two can never disagree on the wire:
///
/// ```
/// use aer_mapping::ErrorCode;
///
/// #[derive(Debug, Clone, Copy)]
/// enum MyEnum {
///     TooBig,
/// }
///
/// impl ErrorCode for MyEnum {
///     fn code(&self) -> i32 {
///         match self {
///             Self::TooBig => 7,
///         }
///     }
/// }
///
/// assert_eq!(MyEnum::TooBig.name(), "MyEnum.TooBig");
/// ```
pub trait ErrorCode: fmt::Debug + Copy + Send + Sync + 'static {
    /// Stable numeric code for this value.
    fn code(&self) -> i32;

    /// Stable category name, `"<EnumName>.<Variant>"` by default.
    fn name(&self) -> String {
        let ty = std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("ErrorCode");
        format!("{ty}.{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Startup-time mapping registration failure.
///
/// Both variants are fatal: a process must not come up with a
/// half-configured registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The status code is outside the 4xx/5xx range.
    #[error("invalid http status code: {status}. only 4xx and 5xx status codes are allowed")]
    InvalidStatusCode {
        /// The offending status code.
        status: u16,
    },
    /// The same exception type was mapped twice within one profile.
    #[error("duplicate entry. exception already added to profile: {exception_type}")]
    DuplicateInProfile {
        /// Fully-qualified name of the exception type.
        exception_type: &'static str,
    },
    /// The same exception type was mapped by two different profiles.
    #[error("exception type mapped by more than one profile: {exception_type}")]
    DuplicateAcrossProfiles {
        /// Fully-qualified name of the exception type.
        exception_type: &'static str,
    },
}

impl RegistrationError {
    /// The exception type the error refers to, if any.
    #[must_use]
    pub fn exception_type(&self) -> Option<&'static str> {
        match self {
            Self::InvalidStatusCode { .. } => None,
            Self::DuplicateInProfile { exception_type }
            | Self::DuplicateAcrossProfiles { exception_type } => Some(exception_type),
        }
    }
}

/// Failure of a mapping entry's code resolver when applied to an instance.
///
/// Recovered per request: the builder reclassifies the error as unexpected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("error code resolver failed for {exception_type}: {reason}")]
pub struct ResolveError {
    /// Fully-qualified name of the exception type being resolved.
    pub exception_type: &'static str,
    /// Why the resolver failed.
    pub reason: String,
}

impl ResolveError {
    /// Convenience constructor.
    pub fn new(exception_type: &'static str, reason: impl Into<String>) -> Self {
        Self {
            exception_type,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// MappingEntry
// ---------------------------------------------------------------------------

type Resolver = Arc<dyn Fn(&dyn ApiException) -> Result<(i32, String), ResolveError> + Send + Sync>;

/// One exception-type → (status, error code) association.
///
/// Immutable once built; the resolver closure carries both the numeric code
/// and the category name so they always agree.
#[derive(Clone)]
pub struct MappingEntry {
    status: StatusCode,
    exception_type: &'static str,
    resolver: Resolver,
}

impl MappingEntry {
    /// HTTP status code returned for this exception type.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Fully-qualified name of the mapped exception type.
    #[must_use]
    pub fn exception_type(&self) -> &'static str {
        self.exception_type
    }

    /// Resolves `(error_code, error_name)` from the concrete instance.
    pub fn resolve(&self, exception: &dyn ApiException) -> Result<(i32, String), ResolveError> {
        (self.resolver)(exception)
    }
}

impl fmt::Debug for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingEntry")
            .field("status", &self.status)
            .field("exception_type", &self.exception_type)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MappingProfile
// ---------------------------------------------------------------------------

/// A declarative, author-time grouping of exception-type mappings.
///
/// ```
/// use aer_mapping::{ErrorCode, MappingProfile};
/// use aer_taxonomy::ApiException;
/// use http::StatusCode;
/// use std::any::Any;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("out of range")]
/// struct OutOfRange;
///
/// impl ApiException for OutOfRange {
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// #[derive(Debug, Clone, Copy)]
/// enum MyEnum {
///     TooBig,
/// }
///
/// impl ErrorCode for MyEnum {
///     fn code(&self) -> i32 {
///         7
///     }
/// }
///
/// let mut profile = MappingProfile::new();
/// profile
///     .add_mapping::<OutOfRange, _>(StatusCode::BAD_REQUEST, MyEnum::TooBig)
///     .unwrap();
/// ```
#[derive(Default)]
pub struct MappingProfile {
    entries: HashMap<TypeId, MappingEntry>,
}

impl MappingProfile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `E` to a fixed status code and error code.
    pub fn add_mapping<E, C>(&mut self, status: StatusCode, code: C) -> Result<(), RegistrationError>
    where
        E: ApiException,
        C: ErrorCode,
    {
        self.add_mapping_with::<E, C, _>(status, move |_| Ok(code))
    }

    /// Maps `E` to a fixed status code with an error code derived from the
    /// instance.
    ///
    /// A resolver failure at request time is not fatal; the affected request
    /// falls back to the unexpected-error classification.
    pub fn add_mapping_with<E, C, F>(
        &mut self,
        status: StatusCode,
        resolve: F,
    ) -> Result<(), RegistrationError>
    where
        E: ApiException,
        C: ErrorCode,
        F: Fn(&E) -> Result<C, ResolveError> + Send + Sync + 'static,
    {
        if !(400..=599).contains(&status.as_u16()) {
            return Err(RegistrationError::InvalidStatusCode {
                status: status.as_u16(),
            });
        }

        let exception_type = std::any::type_name::<E>();
        let key = TypeId::of::<E>();
        if self.entries.contains_key(&key) {
            return Err(RegistrationError::DuplicateInProfile { exception_type });
        }

        let resolver: Resolver = Arc::new(move |exception| {
            let concrete = exception.as_any().downcast_ref::<E>().ok_or_else(|| {
                ResolveError::new(exception_type, "concrete type does not match this mapping")
            })?;
            let code = resolve(concrete)?;
            Ok((code.code(), code.name()))
        });

        self.entries.insert(
            key,
            MappingEntry {
                status,
                exception_type,
                resolver,
            },
        );
        Ok(())
    }

    /// Number of mappings in this profile.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the profile has no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MappingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingProfile")
            .field("entries", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MapperOptions
// ---------------------------------------------------------------------------

/// Options applied to the merged [`ExceptionMapper`].
#[derive(Debug, Clone)]
pub struct MapperOptions {
    /// Name of the emitting service, echoed in every error body.
    pub service_name: String,
    /// Whether mapped responses include the exception's developer context.
    pub respond_with_developer_context: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            respond_with_developer_context: true,
        }
    }
}

/// File stem of the current executable, or `"unknown-service"`.
fn default_service_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown-service".to_owned())
}

// ---------------------------------------------------------------------------
// ExceptionMapper
// ---------------------------------------------------------------------------

/// The merged, validated, immutable mapping registry.
pub struct ExceptionMapper {
    entries: HashMap<TypeId, MappingEntry>,
    options: MapperOptions,
}

impl ExceptionMapper {
    /// Merges the given profiles into one registry.
    ///
    /// Fails with [`RegistrationError::DuplicateAcrossProfiles`] if two
    /// profiles map the same exception type; no partial registry is exposed.
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = MappingProfile>,
        options: MapperOptions,
    ) -> Result<Self, RegistrationError> {
        let mut entries: HashMap<TypeId, MappingEntry> = HashMap::new();
        for profile in profiles {
            for (key, entry) in profile.entries {
                match entries.entry(key) {
                    Entry::Occupied(_) => {
                        return Err(RegistrationError::DuplicateAcrossProfiles {
                            exception_type: entry.exception_type,
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                }
            }
        }
        Ok(Self { entries, options })
    }

    /// Exact-runtime-type lookup.
    ///
    /// Returns `None` for any type without its own entry, including subtypes
    /// of mapped types.
    #[must_use]
    pub fn lookup(&self, exception: &dyn ApiException) -> Option<&MappingEntry> {
        self.entries.get(&exception.as_any().type_id())
    }

    /// Options this registry was built with.
    #[must_use]
    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    /// Number of entries across all merged profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no profile contributed any mapping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ExceptionMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionMapper")
            .field("entries", &self.entries.len())
            .field("options", &self.options)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Process-wide install guard
// ---------------------------------------------------------------------------

static INSTALLED: OnceLock<Arc<ExceptionMapper>> = OnceLock::new();

/// Installs the process-wide mapper, first caller wins.
///
/// Later calls are no-ops that return the already-installed mapper, so
/// repeated startup registration is tolerated. Handlers should still receive
/// the mapper by explicit parameter; this guard exists for boundary glue
/// that has no other channel (e.g. `IntoResponse` impls).
pub fn install(mapper: ExceptionMapper) -> Arc<ExceptionMapper> {
    INSTALLED.get_or_init(|| Arc::new(mapper)).clone()
}

/// The installed process-wide mapper, if any.
#[must_use]
pub fn installed() -> Option<Arc<ExceptionMapper>> {
    INSTALLED.get().cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
