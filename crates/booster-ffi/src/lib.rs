// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Engine PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the Rust booster engine.
//!
//! Exposes `BoosterConfig` and `RustBoosterEngine` to Python via PyO3.
//!
//! # FFI Safety
//!
//! - The GIL is released for the whole resolution, and reacquired via
//!   `Python::with_gil` inside every call to a Python kernel.
//! - Python exceptions raised by a kernel fail the request with
//!   `ValueError`; a booster is never assembled from default values.
//! - All config validated before storage (`BoosterConfig::validate()`).
//!
//! Install: `pip install -e crates/booster-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from booster_kernel import BoosterConfig, RustBoosterEngine
//!
//! engine = RustBoosterEngine(BoosterConfig(root_dir="data", immirzi=1.2))
//! b4 = engine.resolve(1, [2, 2, 2, 2], 0)
//! print(b4["dims"])  # [3, 3, 1, 1, 1, 1]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use booster_core::{vertex_boosters, BoosterEngine, BoosterTensor, Resolution, ResolveSource};
use booster_physics::{BlockKernel, BlockMatrix, ExternalKernel, HeuristicKernel};
use booster_types::{BoosterConfig, BoosterError, BoosterKey, DSpin};

fn to_py_err(e: BoosterError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn tensor_dict<'py>(py: Python<'py>, tensor: &BoosterTensor) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("dims", tensor.dims().to_vec())?;
    dict.set_item("data", tensor.data().to_vec())?;
    Ok(dict)
}

fn source_name(source: ResolveSource) -> String {
    match source {
        ResolveSource::Degenerate => "degenerate".into(),
        ResolveSource::ExactHit => "exact_hit".into(),
        ResolveSource::PartialHit { dl } => format!("partial_hit:{dl}"),
        ResolveSource::Computed => "computed".into(),
    }
}

/// Kernel delegating to `callback(two_js, two_ls) -> list[list[float]]`,
/// rows indexed by the outer intertwiner.
fn python_kernel(callback: PyObject) -> ExternalKernel {
    ExternalKernel::new(move |two_js, two_ls| {
        Python::with_gil(|py| {
            let rows: Vec<Vec<f64>> = callback
                .call1(py, (two_js.to_vec(), two_ls.to_vec()))
                .and_then(|result| result.extract(py))
                .map_err(|e| BoosterError::Kernel(format!("python kernel failed: {e}")))?;
            let cols = rows.first().map_or(0, Vec::len);
            if rows.iter().any(|r| r.len() != cols) {
                return Err(BoosterError::Kernel(format!(
                    "python kernel returned ragged rows for ls={two_ls:?}"
                )));
            }
            let mut data = Vec::with_capacity(rows.len() * cols);
            for c in 0..cols {
                data.extend(rows.iter().map(|r| r[c]));
            }
            BlockMatrix::from_col_major(rows.len(), cols, data)
        })
    })
}

// ─── PyBoosterConfig ────────────────────────────────────────────────

/// Python-visible configuration for the booster engine.
#[pyclass(name = "BoosterConfig")]
#[derive(Clone)]
struct PyBoosterConfig {
    inner: BoosterConfig,
}

#[pymethods]
impl PyBoosterConfig {
    #[new]
    #[pyo3(signature = (
        root_dir = PathBuf::from("data"),
        immirzi = 1.0,
        store = true,
        parallel = true,
        threads = 0,
        max_two_spin = 300,
    ))]
    fn new(
        root_dir: PathBuf,
        immirzi: f64,
        store: bool,
        parallel: bool,
        threads: usize,
        max_two_spin: DSpin,
    ) -> PyResult<Self> {
        let config = BoosterConfig {
            root_dir,
            immirzi,
            store,
            parallel,
            threads,
            max_two_spin,
        };
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = BoosterConfig::from_json(json).map_err(to_py_err)?;
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    #[getter]
    fn immirzi(&self) -> f64 {
        self.inner.immirzi
    }

    #[getter]
    fn store(&self) -> bool {
        self.inner.store
    }

    fn __repr__(&self) -> String {
        format!(
            "BoosterConfig(root_dir={:?}, immirzi={}, store={}, parallel={})",
            self.inner.root_dir, self.inner.immirzi, self.inner.store, self.inner.parallel
        )
    }
}

// ─── RustBoosterEngine ──────────────────────────────────────────────

/// Booster resolution engine exposed to Python.
///
/// Without a callback the deterministic heuristic kernel is used.
#[pyclass(name = "RustBoosterEngine")]
struct PyBoosterEngine {
    inner: BoosterEngine,
}

#[pymethods]
impl PyBoosterEngine {
    #[new]
    #[pyo3(signature = (config, kernel_callback = None))]
    fn new(config: PyRef<'_, PyBoosterConfig>, kernel_callback: Option<PyObject>) -> PyResult<Self> {
        let kernel: Arc<dyn BlockKernel> = match kernel_callback {
            Some(cb) => Arc::new(python_kernel(cb)),
            None => Arc::new(HeuristicKernel),
        };
        let inner = BoosterEngine::new(config.inner.clone(), kernel).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Resolve one booster tensor.
    ///
    /// Args:
    ///     gf: Gauge-fixed axis, 1..4.
    ///     two_js: Doubled boundary spins (ja, jb, jc, jd).
    ///     dl: Number of virtual-spin shells, 0..50.
    ///     persist: Store the result in the cache.
    ///
    /// Returns:
    ///     dict with `dims`, `data` (column-major), `source`, `computed`
    ///     and `copied`, or None if the booster is degenerate.
    #[pyo3(signature = (gf, two_js, dl, persist = true))]
    fn resolve<'py>(
        &self,
        py: Python<'py>,
        gf: u8,
        two_js: [DSpin; 4],
        dl: u32,
        persist: bool,
    ) -> PyResult<Option<Bound<'py, PyDict>>> {
        let key = BoosterKey::from_raw(gf, two_js, dl).map_err(to_py_err)?;
        let Resolution { tensor, report } = py
            .allow_threads(|| self.inner.resolve(&key, persist))
            .map_err(to_py_err)?;
        match tensor {
            Some(t) => {
                let dict = tensor_dict(py, &t)?;
                dict.set_item("source", source_name(report.source))?;
                dict.set_item("computed", report.computed)?;
                dict.set_item("copied", report.copied)?;
                Ok(Some(dict))
            }
            None => Ok(None),
        }
    }

    /// Load a stored tensor without computing.
    fn load<'py>(
        &self,
        py: Python<'py>,
        gf: u8,
        two_js: [DSpin; 4],
        dl: u32,
    ) -> PyResult<Bound<'py, PyDict>> {
        let key = BoosterKey::from_raw(gf, two_js, dl).map_err(to_py_err)?;
        let tensor = py
            .allow_threads(|| self.inner.load(&key))
            .map_err(to_py_err)?;
        tensor_dict(py, &tensor)
    }

    /// Resolve the four boosters of a vertex.
    ///
    /// Returns:
    ///     (list of 4 tensor dicts or None, list of 4 outer i minima)
    fn vertex<'py>(
        &self,
        py: Python<'py>,
        two_js: [DSpin; 10],
        dl: u32,
    ) -> PyResult<(Vec<Option<Bound<'py, PyDict>>>, Vec<DSpin>)> {
        let out = py
            .allow_threads(|| vertex_boosters(&self.inner, &two_js, dl))
            .map_err(to_py_err)?;
        let tensors = out
            .tensors
            .iter()
            .map(|t| t.as_ref().map(|t| tensor_dict(py, t)).transpose())
            .collect::<PyResult<Vec<_>>>()?;
        Ok((tensors, out.two_i_mins.to_vec()))
    }

    /// Replace the configuration (revalidated).
    fn reconfigure(&mut self, config: PyRef<'_, PyBoosterConfig>) -> PyResult<()> {
        self.inner
            .reconfigure(config.inner.clone())
            .map_err(to_py_err)
    }

    #[getter]
    fn workers(&self) -> usize {
        self.inner.workers()
    }

    fn __repr__(&self) -> String {
        let c = self.inner.config();
        format!(
            "RustBoosterEngine(root_dir={:?}, immirzi={}, store={})",
            c.root_dir, c.immirzi, c.store
        )
    }
}

// ─── Module Registration ────────────────────────────────────────────

/// Booster Kernel — Rust booster tensor engine for spinfoam amplitudes.
///
/// - `BoosterConfig` — configuration
/// - `RustBoosterEngine` — cached, parallel booster resolution
#[pymodule]
fn booster_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBoosterConfig>()?;
    m.add_class::<PyBoosterEngine>()?;
    Ok(())
}
