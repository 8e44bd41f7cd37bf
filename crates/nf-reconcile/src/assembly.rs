//! Assembly classification.
//!
//! [`AssemblyClassifier`] is the seam through which the registry learns the
//! name, version and public key token of a referenced DLL. The default
//! [`MetadataClassifier`] loads the file with `dotscope` and reads them from
//! its `Assembly` manifest row.
//!
//! [`HintPathResolver`] turns a recorded hint path back into a file location.

use camino::{Utf8Path, Utf8PathBuf};
use dotscope::CilObject;
use nf_core::AssemblyAttributes;
use sha1::{Digest, Sha1};

use crate::error::ClassifyError;

/// Reads the identity of an assembly file.
pub trait AssemblyClassifier: std::fmt::Debug {
    /// Classifies the assembly at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::NotFound`] when the file is missing and other
    /// [`ClassifyError`] variants when it cannot be read as an assembly.
    fn classify(&self, path: &Utf8Path) -> Result<AssemblyAttributes, ClassifyError>;
}

/// Locates assemblies from recorded hint paths.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use nf_reconcile::HintPathResolver;
///
/// let resolver = HintPathResolver::new(Utf8Path::new("/src/sln"), "SolutionDir");
/// assert_eq!(
///     resolver.resolve(r"$(SolutionDir)\packages\Foo.1.0\lib\Foo.dll", Utf8Path::new("/src/sln/A")),
///     Utf8Path::new("/src/sln/packages/Foo.1.0/lib/Foo.dll")
/// );
/// assert_eq!(
///     resolver.resolve(r"..\packages\Foo.1.0\lib\Foo.dll", Utf8Path::new("/src/sln/A")),
///     Utf8Path::new("/src/sln/A/../packages/Foo.1.0/lib/Foo.dll")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HintPathResolver {
    solution_dir: Utf8PathBuf,
    variable: String,
}

impl HintPathResolver {
    /// Creates a resolver expanding `$(<variable>)` to the solution directory.
    #[must_use]
    pub fn new(solution_dir: &Utf8Path, variable: &str) -> Self {
        Self {
            solution_dir: solution_dir.to_owned(),
            variable: format!("$({variable})"),
        }
    }

    /// Resolves a hint path recorded in the project at `project_dir`.
    #[must_use]
    pub fn resolve(&self, hint_path: &str, project_dir: &Utf8Path) -> Utf8PathBuf {
        if let Some(rest) = strip_prefix_ignore_case(hint_path, &self.variable) {
            return self.solution_dir.join(portable(rest.trim_start_matches(['\\', '/'])));
        }
        let path = portable(hint_path);
        if Utf8Path::new(&path).is_absolute() {
            return Utf8PathBuf::from(path);
        }
        project_dir.join(path)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn portable(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '\\' {
        path.to_owned()
    } else {
        path.replace('\\', "/")
    }
}

/// Classifies assemblies by reading their CLI metadata.
///
/// The public key token is the last eight bytes of the SHA-1 hash of the
/// public key, in reverse order, as lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataClassifier;

impl AssemblyClassifier for MetadataClassifier {
    fn classify(&self, path: &Utf8Path) -> Result<AssemblyAttributes, ClassifyError> {
        if !path.is_file() {
            return Err(ClassifyError::NotFound(path.to_owned()));
        }
        let object =
            CilObject::from_file(path.as_std_path()).map_err(|err| ClassifyError::metadata(path, err))?;
        let manifest = object
            .assembly()
            .ok_or_else(|| ClassifyError::NoManifest(path.to_owned()))?;

        Ok(manifest_attributes(
            &manifest.name,
            [
                manifest.major_version,
                manifest.minor_version,
                manifest.build_number,
                manifest.revision_number,
            ],
            manifest.public_key.as_deref(),
        ))
    }
}

/// Builds the attributes of an assembly manifest row.
fn manifest_attributes(name: &str, version: [u32; 4], public_key: Option<&[u8]>) -> AssemblyAttributes {
    let [major, minor, build, revision] = version;
    let token = public_key
        .filter(|key| !key.is_empty())
        .map(public_key_token);
    AssemblyAttributes::new(name, format!("{major}.{minor}.{build}.{revision}"), token)
}

/// Computes the public key token of a public key blob.
///
/// # Examples
///
/// ```
/// use nf_reconcile::public_key_token;
///
/// // The ECMA standard public key.
/// let ecma = [0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
/// assert_eq!(public_key_token(&ecma), "b77a5c561934e089");
/// ```
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> String {
    let digest = Sha1::digest(public_key);
    let token: Vec<u8> = digest.iter().rev().take(8).copied().collect();
    hex::encode(token)
}
