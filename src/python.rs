use crate::{CacheKind, InlineError, Inliner, MergeMode, specificity, translate};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

#[pyclass(name = "Inliner")]
struct PyInliner {
    inner: Inliner,
}

#[pymethods]
impl PyInliner {
    #[new]
    #[pyo3(signature = (
        html="",
        css="",
        unprocessable_tags=None,
        preserve_encoding=false,
        overwrite_duplicate_styles=true,
        debug_log=None,
        perf_log=None
    ))]
    fn new(
        html: &str,
        css: &str,
        unprocessable_tags: Option<Vec<String>>,
        preserve_encoding: bool,
        overwrite_duplicate_styles: bool,
        debug_log: Option<String>,
        perf_log: Option<String>,
    ) -> PyResult<Self> {
        let mut builder = Inliner::builder()
            .html(html)
            .css(css)
            .preserve_encoding(preserve_encoding)
            .overwrite_duplicate_styles(overwrite_duplicate_styles);
        if let Some(tags) = unprocessable_tags {
            builder = builder.unprocessable_tags(tags);
        }
        if let Some(path) = debug_log {
            builder = builder.debug_log(path);
        }
        if let Some(path) = perf_log {
            builder = builder.perf_log(path);
        }
        let inner = builder.build().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn set_html(&mut self, html: &str) {
        self.inner.set_html(html);
    }

    fn set_css(&mut self, css: &str) {
        self.inner.set_css(css);
    }

    #[pyo3(signature = (html=None))]
    fn inline(&mut self, html: Option<&str>) -> PyResult<String> {
        match html {
            Some(html) => self.inner.inline_html(html),
            None => self.inner.inline(),
        }
        .map_err(to_py_err)
    }

    fn add_unprocessable_tag(&mut self, tag: &str) -> PyResult<()> {
        validate_tag(tag)?;
        self.inner.add_unprocessable_tag(tag);
        Ok(())
    }

    fn remove_unprocessable_tag(&mut self, tag: &str) {
        self.inner.remove_unprocessable_tag(tag);
    }

    #[getter]
    fn unprocessable_tags(&self) -> Vec<String> {
        self.inner.unprocessable_tags().to_vec()
    }

    #[pyo3(signature = (kind=None))]
    fn clear_cache(&mut self, kind: Option<&str>) -> PyResult<()> {
        match kind {
            None => self.inner.clear_cache(),
            Some(raw) => self.inner.clear_cache_kind(parse_cache_kind(raw)?),
        }
        Ok(())
    }

    fn cache_stats(&self, py: Python<'_>) -> PyResult<PyObject> {
        let stats = self.inner.cache_stats();
        let dict = PyDict::new_bound(py);
        dict.set_item("stylesheets", stats.stylesheets)?;
        dict.set_item("specificities", stats.specificities)?;
        dict.set_item("queries", stats.queries)?;
        dict.set_item("hits", stats.hits)?;
        dict.set_item("misses", stats.misses)?;
        Ok(dict.into_any().unbind())
    }

    #[getter]
    fn get_preserve_encoding(&self) -> bool {
        self.inner.preserve_encoding()
    }

    #[setter]
    fn set_preserve_encoding(&mut self, enabled: bool) {
        self.inner.set_preserve_encoding(enabled);
    }

    #[getter]
    fn get_overwrite_duplicate_styles(&self) -> bool {
        self.inner.merge_mode() == MergeMode::NewWins
    }

    #[setter]
    fn set_overwrite_duplicate_styles(&mut self, enabled: bool) {
        self.inner.set_overwrite_duplicate_styles(enabled);
    }
}

#[pyfunction]
fn selector_to_query(selector: &str) -> PyResult<String> {
    translate(selector)
        .map(|query| query.to_string())
        .map_err(|err| PyValueError::new_err(err.to_string()))
}

#[pyfunction]
fn selector_specificity(selector: &str) -> u32 {
    specificity(selector)
}

#[pymodule]
fn _inliner(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyInliner>()?;
    module.add_function(wrap_pyfunction!(selector_to_query, module)?)?;
    module.add_function(wrap_pyfunction!(selector_specificity, module)?)?;
    Ok(())
}

fn parse_cache_kind(raw: &str) -> PyResult<CacheKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "stylesheet" | "css" => Ok(CacheKind::StyleSheet),
        "specificity" => Ok(CacheKind::Specificity),
        "query" | "xpath" => Ok(CacheKind::Query),
        other => Err(PyValueError::new_err(format!(
            "unknown cache kind: {other} (expected stylesheet, specificity or query)"
        ))),
    }
}

fn validate_tag(tag: &str) -> PyResult<()> {
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(PyValueError::new_err(format!("invalid tag name: {tag:?}")));
    }
    Ok(())
}

fn to_py_err(err: InlineError) -> PyErr {
    PyValueError::new_err(err.to_string())
}
