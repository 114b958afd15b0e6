//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG context: library resolution and the compiled data model.
//!
//! [`SchemaData`] registers the modules enumerated by a YANG library
//! description, resolves prefixes and imports, orders implemented modules
//! topologically, verifies feature prerequisites and builds the identity
//! derivation graph. [`Context`] owns the schema data together with the
//! compiled schema tree; once constructed it is immutable and may be shared
//! freely between threads.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde::Deserialize;

use crate::data::InstanceNode;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::route::{self, InstanceRoute};
use crate::schema::{SchemaNode, SchemaTree};
use crate::statement::{ModuleParser, ModuleStatements, Statement};
use crate::xml;

/// Qualified name: local name plus the name of the main module that defines
/// it (the namespace).
pub type QualName = (String, String);

/// Canonical key of a registered module or submodule. An empty revision
/// stands for "no revision".
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ModuleId {
    pub name: String,
    pub revision: String,
}

impl ModuleId {
    pub fn new(name: &str, revision: &str) -> ModuleId {
        ModuleId {
            name: name.to_string(),
            revision: revision.to_string(),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.revision)
        }
    }
}

// ===== YANG library description (RFC 7895 form) =====

#[derive(Debug, Deserialize)]
struct YangLibrary {
    #[serde(rename = "ietf-yang-library:modules-state")]
    modules_state: ModulesState,
}

#[derive(Debug, Deserialize)]
struct ModulesState {
    #[serde(rename = "module-set-id", default)]
    module_set_id: String,
    #[serde(default)]
    module: Vec<ModuleEntry>,
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    name: String,
    #[serde(default)]
    revision: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(rename = "conformance-type")]
    conformance_type: String,
    #[serde(default)]
    feature: Vec<String>,
    #[serde(default)]
    deviation: Vec<NameAndRevision>,
    #[serde(default)]
    submodule: Vec<NameAndRevision>,
    #[serde(default, rename = "schema")]
    _schema: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NameAndRevision {
    name: String,
    #[serde(default)]
    revision: String,
}

// ===== module data =====

/// Data related to one registered YANG module or submodule.
#[derive(Debug)]
pub(crate) struct ModuleData {
    /// Identifier of the main module (itself for main modules).
    pub(crate) main_module: ModuleId,
    /// Set of supported features (main modules only).
    pub(crate) features: HashSet<String>,
    /// Map of prefixes declared in this (sub)module text.
    pub(crate) prefix_map: HashMap<String, ModuleId>,
    /// Prefix the (sub)module declares for itself.
    pub(crate) local_prefix: String,
    /// Parsed statement tree.
    pub(crate) statement: ModuleStatements,
    /// Submodules of a main module.
    pub(crate) submodules: BTreeSet<ModuleId>,
    /// XML namespace URI (from the library entry, main modules only).
    pub(crate) xml_namespace: Option<String>,
    /// Modules whose deviations apply to this module (informational).
    pub(crate) deviations: Vec<ModuleId>,
}

/// Adjacency data of one identity: its direct bases and direct derivations.
#[derive(Debug, Default)]
pub(crate) struct IdentityAdjacency {
    pub(crate) bases: HashSet<QualName>,
    pub(crate) derivs: HashSet<QualName>,
}

/// Ambient context threaded through schema construction: the module whose
/// text is being read and the namespace unprefixed names resolve to.
#[derive(Clone, Debug)]
pub(crate) struct SchemaContext {
    /// Main-module name serving as the default namespace.
    pub(crate) default_ns: String,
    /// Identifier of the module or submodule whose text is being read.
    pub(crate) text_mid: ModuleId,
}

// ===== schema data =====

/// Repository of everything the YANG library description resolves to.
#[derive(Debug, Default)]
pub(crate) struct SchemaData {
    /// All registered modules and submodules.
    pub(crate) modules: HashMap<ModuleId, ModuleData>,
    /// Implemented revision per module name.
    pub(crate) implement: HashMap<String, String>,
    /// Implemented modules (with their submodules) in import-topological
    /// order; defines the order of schema construction and augment
    /// application.
    pub(crate) module_sequence: Vec<ModuleId>,
    /// Identity derivation graph.
    pub(crate) identity_adjs: HashMap<QualName, IdentityAdjacency>,
    /// `module-set-id` from the library description.
    pub(crate) module_set_id: String,
}

impl SchemaData {
    pub(crate) fn from_yang_library(
        yang_library: &str,
        search_path: &[PathBuf],
    ) -> Result<SchemaData> {
        let yl: YangLibrary = serde_json::from_str(yang_library).map_err(|e| {
            Error::BadYangLibraryData {
                message: e.to_string(),
            }
        })?;
        let mut res = SchemaData {
            module_set_id: yl.modules_state.module_set_id.clone(),
            ..Default::default()
        };
        for item in &yl.modules_state.module {
            let mid = ModuleId::new(&item.name, &item.revision);
            if item.conformance_type == "implement" {
                if res.implement.contains_key(&item.name) {
                    return Err(Error::MultipleImplementedRevisions {
                        name: item.name.clone(),
                    });
                }
                res.implement
                    .insert(item.name.clone(), item.revision.clone());
            } else if item.conformance_type != "import" {
                return Err(Error::BadYangLibraryData {
                    message: format!(
                        "bad conformance-type '{}' of module {}",
                        item.conformance_type, mid
                    ),
                });
            }
            let statement = Self::load_module(&item.name, &item.revision, search_path)?;
            debug!("registered module {}", mid);
            let local_prefix = statement
                .root()
                .find1_required("prefix")?
                .argument_required()?
                .to_string();
            let mut prefix_map = HashMap::new();
            prefix_map.insert(local_prefix.clone(), mid.clone());
            let mut mdata = ModuleData {
                main_module: mid.clone(),
                features: item.feature.iter().cloned().collect(),
                prefix_map,
                local_prefix,
                statement,
                submodules: BTreeSet::new(),
                xml_namespace: item.namespace.clone(),
                deviations: item
                    .deviation
                    .iter()
                    .map(|d| ModuleId::new(&d.name, &d.revision))
                    .collect(),
            };
            for sub in &item.submodule {
                let smid = ModuleId::new(&sub.name, &sub.revision);
                let statement = Self::load_module(&sub.name, &sub.revision, search_path)?;
                let root = statement.root();
                let bt = root
                    .find1_arg("belongs-to", &item.name)
                    .ok_or_else(|| Error::StatementNotFound {
                        parent: root.text(),
                        keyword: "belongs-to".to_string(),
                    })?;
                let local_prefix = bt
                    .find1_required("prefix")?
                    .argument_required()?
                    .to_string();
                let mut prefix_map = HashMap::new();
                prefix_map.insert(local_prefix.clone(), mid.clone());
                mdata.submodules.insert(smid.clone());
                res.modules.insert(
                    smid,
                    ModuleData {
                        main_module: mid.clone(),
                        features: HashSet::new(),
                        prefix_map,
                        local_prefix,
                        statement,
                        submodules: BTreeSet::new(),
                        xml_namespace: None,
                        deviations: Vec::new(),
                    },
                );
            }
            res.modules.insert(mid, mdata);
        }
        res.process_imports()?;
        res.build_identity_graph()?;
        res.check_feature_dependences()?;
        Ok(res)
    }

    /// Read and parse a module or submodule from the first search-path
    /// directory that has it, as `{name}.yang` or `{name}@{revision}.yang`.
    fn load_module(
        name: &str,
        revision: &str,
        search_path: &[PathBuf],
    ) -> Result<ModuleStatements> {
        for dir in search_path {
            let mut filename = name.to_string();
            if !revision.is_empty() {
                filename.push('@');
                filename.push_str(revision);
            }
            filename.push_str(".yang");
            let path = dir.join(&filename);
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(_) => continue,
            };
            return ModuleParser::new(&text)
                .with_expected(
                    Some(name),
                    if revision.is_empty() {
                        None
                    } else {
                        Some(revision)
                    },
                )
                .parse();
        }
        Err(Error::ModuleNotFound {
            name: name.to_string(),
            revision: revision.to_string(),
        })
    }

    /// Resolve `import` statements into prefix maps and topologically sort
    /// the implemented modules by their import dependencies.
    fn process_imports(&mut self) -> Result<()> {
        let impl_mids: HashSet<ModuleId> = self
            .implement
            .iter()
            .map(|(name, rev)| ModuleId::new(name, rev))
            .collect();
        if impl_mids.is_empty() {
            return Ok(());
        }
        let mut deps: HashMap<ModuleId, HashSet<ModuleId>> = impl_mids
            .iter()
            .map(|mid| (mid.clone(), HashSet::new()))
            .collect();
        let mut impby: HashMap<ModuleId, HashSet<ModuleId>> = deps.clone();

        let mids: Vec<ModuleId> = self.modules.keys().cloned().collect();
        for mid in &mids {
            let mut resolved = Vec::new();
            {
                let mdata = &self.modules[mid];
                for impst in mdata.statement.root().find_all("import") {
                    let impn = impst.argument_required()?;
                    let prefix = impst
                        .find1_required("prefix")?
                        .argument_required()?
                        .to_string();
                    let imid = match impst.find1("revision-date") {
                        Some(revst) => {
                            let rev = revst.argument_required()?;
                            let imid = ModuleId::new(impn, rev);
                            if !self.modules.contains_key(&imid) {
                                return Err(Error::ModuleNotRegistered {
                                    name: impn.to_string(),
                                    revision: rev.to_string(),
                                });
                            }
                            imid
                        }
                        None => self.last_revision(impn)?.clone(),
                    };
                    resolved.push((prefix, imid));
                }
            }
            let main = self.modules[mid].main_module.clone();
            for (prefix, imid) in resolved {
                if impl_mids.contains(&main) && impl_mids.contains(&imid) && main != imid {
                    deps.get_mut(&main).unwrap().insert(imid.clone());
                    impby.get_mut(&imid).unwrap().insert(main.clone());
                }
                self.modules
                    .get_mut(mid)
                    .unwrap()
                    .prefix_map
                    .insert(prefix, imid);
            }
        }

        let mut free: Vec<ModuleId> = deps
            .iter()
            .filter(|(_, d)| d.is_empty())
            .map(|(mid, _)| mid.clone())
            .collect();
        free.sort();
        if free.is_empty() {
            return Err(Error::CyclicImports);
        }
        while let Some(nid) = free.pop() {
            self.module_sequence.push(nid.clone());
            let subs: Vec<ModuleId> =
                self.modules[&nid].submodules.iter().cloned().collect();
            self.module_sequence.extend(subs);
            for mid in impby[&nid].clone() {
                let d = deps.get_mut(&mid).unwrap();
                d.remove(&nid);
                if d.is_empty() {
                    free.push(mid);
                }
            }
            deps.remove(&nid);
        }
        if deps.values().any(|d| !d.is_empty()) {
            return Err(Error::CyclicImports);
        }
        Ok(())
    }

    /// Collect `identity` statements from every registered module whose
    /// `if-feature`s hold and record base/derivation edges both ways.
    fn build_identity_graph(&mut self) -> Result<()> {
        let mut edges: Vec<(QualName, QualName)> = Vec::new();
        let mut nodes: Vec<QualName> = Vec::new();
        let mids: Vec<ModuleId> = self.modules.keys().cloned().collect();
        for mid in &mids {
            let mdata = &self.modules[mid];
            let ns = mdata.main_module.name.clone();
            for idst in mdata.statement.root().find_all("identity") {
                if !self.if_features(&idst, mid)? {
                    continue;
                }
                let name = idst.argument_required()?.to_string();
                let qn: QualName = (name, ns.clone());
                nodes.push(qn.clone());
                for basest in idst.find_all("base") {
                    let base =
                        self.translate_pname(basest.argument_required()?, mid)?;
                    edges.push((base, qn.clone()));
                }
            }
        }
        for qn in nodes {
            self.identity_adjs.entry(qn).or_default();
        }
        for (base, derived) in edges {
            self.identity_adjs
                .entry(derived.clone())
                .or_default()
                .bases
                .insert(base.clone());
            self.identity_adjs
                .entry(base)
                .or_default()
                .derivs
                .insert(derived);
        }
        Ok(())
    }

    /// For every declared-supported feature, all `if-feature` prerequisites
    /// on its `feature` statement must themselves be supported.
    fn check_feature_dependences(&self) -> Result<()> {
        for mid in self.modules.keys() {
            for fst in self.modules[mid].statement.root().find_all("feature") {
                let (name, fid) =
                    self.resolve_pname(fst.argument_required()?, mid)?;
                if !self.modules[&fid].features.contains(&name) {
                    continue;
                }
                if !self.if_features(&fst, mid)? {
                    return Err(Error::FeaturePrerequisite {
                        namespace: self.namespace(&fid)?.to_string(),
                        name,
                    });
                }
            }
        }
        Ok(())
    }

    /// Namespace (main-module name) corresponding to a module or submodule.
    pub(crate) fn namespace(&self, mid: &ModuleId) -> Result<&str> {
        self.modules
            .get(mid)
            .map(|mdata| mdata.main_module.name.as_str())
            .ok_or_else(|| Error::ModuleNotRegistered {
                name: mid.name.clone(),
                revision: mid.revision.clone(),
            })
    }

    /// The highest registered revision of a module.
    pub(crate) fn last_revision(&self, name: &str) -> Result<&ModuleId> {
        self.modules
            .keys()
            .filter(|mid| mid.name == name)
            .max_by(|a, b| a.revision.cmp(&b.revision))
            .ok_or_else(|| Error::ModuleNotRegistered {
                name: name.to_string(),
                revision: String::new(),
            })
    }

    /// Namespace corresponding to a prefix declared in module `mid`.
    pub(crate) fn prefix2ns(&self, prefix: &str, mid: &ModuleId) -> Result<&str> {
        let mdata = self.modules.get(mid).ok_or_else(|| Error::ModuleNotRegistered {
            name: mid.name.clone(),
            revision: mid.revision.clone(),
        })?;
        match mdata.prefix_map.get(prefix) {
            Some(target) => Ok(&self.modules[target].main_module.name),
            None => Err(Error::UnknownPrefix {
                prefix: prefix.to_string(),
                module: mid.to_string(),
            }),
        }
    }

    /// Split a possibly prefixed name and return the local name together
    /// with the identifier of the module where it is defined.
    pub(crate) fn resolve_pname(
        &self,
        pname: &str,
        mid: &ModuleId,
    ) -> Result<(String, ModuleId)> {
        let mdata = self.modules.get(mid).ok_or_else(|| Error::ModuleNotRegistered {
            name: mid.name.clone(),
            revision: mid.revision.clone(),
        })?;
        match pname.split_once(':') {
            Some((prefix, local)) => match mdata.prefix_map.get(prefix) {
                Some(target) => Ok((local.to_string(), target.clone())),
                None => Err(Error::UnknownPrefix {
                    prefix: prefix.to_string(),
                    module: mid.to_string(),
                }),
            },
            None => Ok((pname.to_string(), mdata.main_module.clone())),
        }
    }

    /// Translate a prefixed name to a qualified name.
    pub(crate) fn translate_pname(&self, pname: &str, mid: &ModuleId) -> Result<QualName> {
        let (local, nid) = self.resolve_pname(pname, mid)?;
        Ok((local, self.namespace(&nid)?.to_string()))
    }

    /// Translate a node identifier to a qualified name: unprefixed names
    /// resolve to the context's default namespace.
    pub(crate) fn translate_node_id(
        &self,
        node_id: &str,
        sctx: &SchemaContext,
    ) -> Result<QualName> {
        match node_id.split_once(':') {
            None => Ok((node_id.to_string(), sctx.default_ns.clone())),
            Some((prefix, local)) => {
                let ns = self.prefix2ns(prefix, &sctx.text_mid)?;
                Ok((local.to_string(), ns.to_string()))
            }
        }
    }

    /// Translate a schema node identifier (absolute or relative) to a list
    /// of qualified names.
    pub(crate) fn sni2route(
        &self,
        sni: &str,
        sctx: &SchemaContext,
    ) -> Result<Vec<QualName>> {
        let mut res = Vec::new();
        for qn in sni.strip_prefix('/').unwrap_or(sni).split('/') {
            res.push(self.translate_node_id(qn, sctx)?);
        }
        Ok(res)
    }

    /// Translate a schema/data path (`/module:name/name2`) to a route of
    /// qualified names.
    pub(crate) fn path2route(path: &str) -> Result<Vec<QualName>> {
        if path == "/" || path.is_empty() {
            return Ok(Vec::new());
        }
        let mut prevns: Option<String> = None;
        let mut res = Vec::new();
        for n in path.strip_prefix('/').unwrap_or(path).split('/') {
            match n.split_once(':') {
                Some((p, loc)) => {
                    if prevns.as_deref() == Some(p) {
                        return Err(Error::InvalidSchemaPath {
                            path: path.to_string(),
                        });
                    }
                    res.push((loc.to_string(), p.to_string()));
                    prevns = Some(p.to_string());
                }
                None => match &prevns {
                    Some(ns) => res.push((n.to_string(), ns.clone())),
                    None => {
                        return Err(Error::InvalidSchemaPath {
                            path: path.to_string(),
                        })
                    }
                },
            }
        }
        Ok(res)
    }

    /// Find the statement defining a grouping or derived type referenced by
    /// a `uses` or `type` statement, with the schema context in which the
    /// definition's own text must be interpreted.
    pub(crate) fn get_definition<'a>(
        &'a self,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<(Statement<'a>, SchemaContext)> {
        let kw = match stmt.keyword() {
            "uses" => "grouping",
            "type" => "typedef",
            other => {
                return Err(Error::BadSchemaNodeType {
                    path: other.to_string(),
                    expected: "'uses' or 'type' statement".to_string(),
                })
            }
        };
        let (local, did) = self.resolve_pname(stmt.argument_required()?, &sctx.text_mid)?;
        if did == sctx.text_mid {
            if let Some(defst) = stmt.get_definition(&local, kw) {
                return Ok((defst, sctx.clone()));
            }
        }
        if let Some(defst) = self.modules[&did].statement.root().find1_arg(kw, &local) {
            return Ok((
                defst,
                SchemaContext {
                    default_ns: sctx.default_ns.clone(),
                    text_mid: did,
                },
            ));
        }
        for sid in &self.modules[&did].submodules {
            if let Some(defst) = self.modules[sid].statement.root().find1_arg(kw, &local)
            {
                return Ok((
                    defst,
                    SchemaContext {
                        default_ns: sctx.default_ns.clone(),
                        text_mid: sid.clone(),
                    },
                ));
            }
        }
        Err(Error::DefinitionNotFound {
            keyword: kw.to_string(),
            name: stmt.argument().unwrap_or_default().to_string(),
        })
    }

    /// Return true if `identity` is transitively derived from `base`.
    pub(crate) fn is_derived_from(&self, identity: &QualName, base: &QualName) -> bool {
        let bases = match self.identity_adjs.get(identity) {
            Some(adj) => &adj.bases,
            None => return false,
        };
        if bases.contains(base) {
            return true;
        }
        bases.iter().any(|ib| self.is_derived_from(ib, base))
    }

    /// Evaluate `if-feature` substatements on a statement, if any.
    pub(crate) fn if_features(&self, stmt: &Statement<'_>, mid: &ModuleId) -> Result<bool> {
        for iff in stmt.find_all("if-feature") {
            let expr = iff.argument_required()?;
            if !FeatureExprParser::new(expr, self, mid.clone()).parse()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// ===== feature expressions =====

/// Parser and evaluator for `if-feature` expressions.
///
/// Grammar: `disj := conj ("or" conj)*; conj := term ("and" term)*;
/// term := "not" atom | atom; atom := "(" disj ")" | prefixed-name`.
pub(crate) struct FeatureExprParser<'a> {
    p: Parser<'a>,
    schema_data: &'a SchemaData,
    mid: ModuleId,
}

impl<'a> FeatureExprParser<'a> {
    pub(crate) fn new(
        text: &'a str,
        schema_data: &'a SchemaData,
        mid: ModuleId,
    ) -> FeatureExprParser<'a> {
        FeatureExprParser {
            p: Parser::new(text),
            schema_data,
            mid,
        }
    }

    pub(crate) fn parse(mut self) -> Result<bool> {
        self.p.skip_ws();
        let res = self.disjunction()?;
        self.p.skip_ws();
        if !self.p.at_end() {
            return Err(self.invalid());
        }
        Ok(res)
    }

    fn invalid(&self) -> Error {
        Error::InvalidFeatureExpression {
            expression: self.p.input.to_string(),
        }
    }

    fn disjunction(&mut self) -> Result<bool> {
        let mut x = self.conjunction()?;
        while self.p.test_string("or") {
            if !self.p.skip_ws() {
                return Err(self.invalid());
            }
            let y = self.conjunction()?;
            x = x || y;
        }
        Ok(x)
    }

    fn conjunction(&mut self) -> Result<bool> {
        let mut x = self.term()?;
        while self.p.test_string("and") {
            if !self.p.skip_ws() {
                return Err(self.invalid());
            }
            let y = self.term()?;
            x = x && y;
        }
        Ok(x)
    }

    fn term(&mut self) -> Result<bool> {
        if self.p.test_string("not") {
            if !self.p.skip_ws() {
                return Err(self.invalid());
            }
            Ok(!self.atom()?)
        } else {
            self.atom()
        }
    }

    fn atom(&mut self) -> Result<bool> {
        if self.p.peek().map_err(|_| self.invalid())? == '(' {
            self.p.adv_skip_ws();
            let res = self.disjunction()?;
            self.p.char(')').map_err(|_| self.invalid())?;
            self.p.skip_ws();
            return Ok(res);
        }
        let (name, prefix) = self.p.prefixed_name().map_err(|_| self.invalid())?;
        self.p.skip_ws();
        let mdata = self
            .schema_data
            .modules
            .get(&self.mid)
            .ok_or_else(|| Error::ModuleNotRegistered {
                name: self.mid.name.clone(),
                revision: self.mid.revision.clone(),
            })?;
        let fid = match prefix {
            None => mdata.main_module.clone(),
            Some(p) => mdata
                .prefix_map
                .get(p)
                .cloned()
                .ok_or_else(|| Error::UnknownPrefix {
                    prefix: p.to_string(),
                    module: self.mid.to_string(),
                })?,
        };
        Ok(self.schema_data.modules[&fid].features.contains(name))
    }
}

// ===== context =====

/// The compiled data model: resolved library data plus the schema tree.
///
/// A `Context` is built once from a YANG library description and a module
/// search path, and is immutable afterwards. Instance cursors borrow from
/// it.
#[derive(Debug)]
pub struct Context {
    pub(crate) schema_data: SchemaData,
    pub(crate) schema: SchemaTree,
    /// Source of modification timestamps for instance values. Confined to
    /// this context; monotone under concurrent use.
    counter: AtomicU64,
}

impl Context {
    /// Build a context from a YANG library description given as a JSON
    /// string, loading module texts from the given search path.
    pub fn from_yang_library_str(
        yang_library: &str,
        search_path: &[PathBuf],
    ) -> Result<Context> {
        let owned_path;
        let search_path = if search_path.is_empty() {
            owned_path = Self::default_search_path();
            &owned_path[..]
        } else {
            search_path
        };
        let schema_data = SchemaData::from_yang_library(yang_library, search_path)?;
        let schema = SchemaTree::build(&schema_data)?;
        debug!(
            "context built: {} modules, module-set-id '{}'",
            schema_data.modules.len(),
            schema_data.module_set_id
        );
        Ok(Context {
            schema_data,
            schema,
            counter: AtomicU64::new(1),
        })
    }

    /// Build a context from a YANG library description stored in a file.
    pub fn from_yang_library_file<P: AsRef<Path>>(
        path: P,
        search_path: &[PathBuf],
    ) -> Result<Context> {
        let text =
            std::fs::read_to_string(path.as_ref()).map_err(|e| Error::BadYangLibraryData {
                message: format!("{}: {}", path.as_ref().display(), e),
            })?;
        Self::from_yang_library_str(&text, search_path)
    }

    /// Default module search path taken from the colon-separated
    /// `YANG_MODPATH` environment variable; the current directory if unset.
    pub fn default_search_path() -> Vec<PathBuf> {
        match std::env::var("YANG_MODPATH") {
            Ok(val) => val.split(':').map(PathBuf::from).collect(),
            Err(_) => vec![PathBuf::from(".")],
        }
    }

    /// `module-set-id` of the library description this context was built
    /// from.
    pub fn module_set_id(&self) -> &str {
        &self.schema_data.module_set_id
    }

    pub(crate) fn new_timestamp(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Get a registered module of the given name and revision (empty
    /// revision means "no revision").
    pub fn get_module(&self, name: &str, revision: &str) -> Option<Module<'_>> {
        let mid = ModuleId::new(name, revision);
        self.schema_data.modules.get_key_value(&mid).map(|(mid, _)| Module {
            context: self,
            mid,
        })
    }

    /// Get the latest registered revision of the module with the given name.
    pub fn get_module_latest(&self, name: &str) -> Option<Module<'_>> {
        self.schema_data
            .last_revision(name)
            .ok()
            .map(|mid| Module { context: self, mid })
    }

    /// Get the (only) implemented revision of the module with the given
    /// name.
    pub fn get_module_implemented(&self, name: &str) -> Option<Module<'_>> {
        let rev = self.schema_data.implement.get(name)?;
        self.get_module(name, rev)
    }

    /// Iterator over all registered main modules.
    pub fn modules(&self) -> impl Iterator<Item = Module<'_>> {
        self.schema_data
            .modules
            .iter()
            .filter(|(mid, mdata)| mdata.main_module == **mid)
            .map(move |(mid, _)| Module { context: self, mid })
    }

    /// Evaluate an `if-feature` expression in the context of the named
    /// module.
    pub fn feature_expr(&self, expression: &str, module: &str) -> Result<bool> {
        let mid = self.schema_data.last_revision(module)?.clone();
        FeatureExprParser::new(expression, &self.schema_data, mid).parse()
    }

    /// The synthetic root of the schema tree.
    pub fn schema_root(&self) -> SchemaNode<'_> {
        SchemaNode::new(self, self.schema.root)
    }

    /// Get a schema node based on a data path
    /// (`/module:container/leaf` form).
    pub fn find_path(&self, path: &str) -> Result<SchemaNode<'_>> {
        let route = SchemaData::path2route(path)?;
        let mut node = self.schema_root();
        for (name, ns) in &route {
            node = node.get_data_child(name, Some(ns.as_str())).ok_or_else(|| {
                Error::NonexistentSchemaNode {
                    parent: node.data_path(),
                    name: format!("{}:{}", ns, name),
                }
            })?;
        }
        Ok(node)
    }

    /// Iterator over all schema nodes (depth-first).
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'_>> {
        self.schema_root().traverse().skip(1)
    }

    /// ASCII-art representation of the data tree.
    pub fn ascii_tree(&self) -> String {
        self.schema.ascii_tree(self)
    }

    /// Cook a raw JSON value into an instance tree and return the root
    /// cursor.
    pub fn from_raw(&self, raw: &serde_json::Value) -> Result<InstanceNode<'_>> {
        InstanceNode::from_raw(self, raw)
    }

    /// Parse a JSON text and cook it into an instance tree.
    pub fn from_raw_str(&self, json: &str) -> Result<InstanceNode<'_>> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::RawType {
                path: "/".to_string(),
                expected: format!("well-formed JSON ({})", e),
            })?;
        self.from_raw(&raw)
    }

    /// Parse an XML document and cook it into an instance tree.
    pub fn from_xml_str(&self, text: &str) -> Result<InstanceNode<'_>> {
        let root = xml::XmlElement::parse(text)?;
        InstanceNode::from_xml(self, &root)
    }

    /// Parse a YANG instance identifier into a route.
    pub fn parse_instance_id(&self, text: &str) -> Result<InstanceRoute> {
        route::parse_instance_id(text)
    }

    /// Parse a RESTCONF data resource identifier into a route.
    pub fn parse_resource_id(&self, text: &str) -> Result<InstanceRoute> {
        route::parse_resource_id(text, self)
    }
}

/// Read handle to one registered main module.
#[derive(Clone, Copy, Debug)]
pub struct Module<'a> {
    context: &'a Context,
    mid: &'a ModuleId,
}

impl<'a> Module<'a> {
    fn data(&self) -> &'a ModuleData {
        &self.context.schema_data.modules[self.mid]
    }

    /// Name of the module.
    pub fn name(&self) -> &'a str {
        &self.mid.name
    }

    /// Revision of the module, if any.
    pub fn revision(&self) -> Option<&'a str> {
        if self.mid.revision.is_empty() {
            None
        } else {
            Some(&self.mid.revision)
        }
    }

    /// XML namespace URI of the module.
    pub fn namespace(&self) -> Option<&'a str> {
        self.data().xml_namespace.as_deref()
    }

    /// Prefix the module declares for itself.
    pub fn prefix(&self) -> &'a str {
        &self.data().local_prefix
    }

    /// Return true if the module is implemented, not just imported.
    pub fn is_implemented(&self) -> bool {
        self.context.schema_data.implement.get(&self.mid.name)
            == Some(&self.mid.revision)
    }

    /// The current status of the given feature in this module.
    pub fn feature_value(&self, feature: &str) -> bool {
        self.data().features.contains(feature)
    }

    /// The parsed statement tree of the module.
    pub fn statement(&self) -> Statement<'a> {
        self.data().statement.root()
    }
}
