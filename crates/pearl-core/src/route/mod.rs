//! Route dispatch: pick the route for a request path and derive the
//! source and transformation options from it.

mod options;

pub use options::{parse_blur, parse_dimension, QueryOptions};

use std::sync::Arc;

use regex::Regex;

use crate::error::ConfigError;
use crate::source::{ImageSource, SourceOptions};
use crate::transform::ImageProcessor;
use crate::types::{Dimensions, TransformRequest};

/// Named group that captures the source path.
pub const IMAGE_PATH_GROUP: &str = "image_path";

/// Optional named groups honored in route patterns.
pub const WIDTH_GROUP: &str = "width";
pub const HEIGHT_GROUP: &str = "height";
pub const IMAGE_EXT_GROUP: &str = "image_ext";

/// Compile a route pattern, requiring an `image_path` named group.
pub fn compile_pattern(route: &str, pattern: &str) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        route: route.to_string(),
        message: e.to_string(),
    })?;
    if !regex.capture_names().any(|name| name == Some(IMAGE_PATH_GROUP)) {
        return Err(ConfigError::MissingImagePathGroup {
            route: route.to_string(),
            pattern: pattern.to_string(),
        });
    }
    Ok(regex)
}

/// A compiled route: pattern plus the source and processor it serves with.
pub struct Route {
    name: String,
    pattern: Regex,
    source: Arc<dyn ImageSource>,
    processor: ImageProcessor,
    cache_control: Option<String>,
}

impl Route {
    pub fn new(
        name: &str,
        pattern: &str,
        source: Arc<dyn ImageSource>,
        processor: ImageProcessor,
        cache_control: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.to_string(),
            pattern: compile_pattern(name, pattern)?,
            source,
            processor,
            cache_control,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<dyn ImageSource> {
        &self.source
    }

    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// Whether this route's pattern matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Derive source and transform options for `path` and `query`, or
    /// `None` if the pattern does not match.
    pub fn options_for(
        &self,
        path: &str,
        query: &str,
    ) -> Option<(SourceOptions, TransformRequest)> {
        let captures = self.pattern.captures(path)?;
        let group = |name: &str| captures.name(name).map(|m| m.as_str()).unwrap_or("");

        let mut image_path = group(IMAGE_PATH_GROUP).to_string();
        image_path.push_str(group(IMAGE_EXT_GROUP));

        let path_dimensions = Dimensions::new(
            parse_dimension(group(WIDTH_GROUP)),
            parse_dimension(group(HEIGHT_GROUP)),
        );
        let request =
            QueryOptions::parse(query).into_request(path_dimensions, self.processor.config());

        Some((SourceOptions::new(image_path), request))
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("source", &self.source.name())
            .field("processor", &self.processor.config().name)
            .finish()
    }
}

/// A matched route with the options derived from the request.
#[derive(Debug)]
pub struct Dispatch<'a> {
    pub route: &'a Route,
    pub source_options: SourceOptions,
    pub request: TransformRequest,
}

/// Ordered routes. The first route whose pattern matches wins.
#[derive(Debug, Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route for `path`, or `None` when no pattern matches.
    pub fn dispatch(&self, path: &str, query: &str) -> Option<Dispatch<'_>> {
        self.routes.iter().find_map(|route| {
            let (source_options, request) = route.options_for(path, query)?;
            tracing::trace!(route = %route.name, "Matched {}", path);
            Some(Dispatch {
                route,
                source_options,
                request,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::error::SourceError;
    use crate::source::SourceImage;
    use crate::types::{Focalpoint, ScaleMode};
    use async_trait::async_trait;

    struct NullSource;

    #[async_trait]
    impl ImageSource for NullSource {
        fn name(&self) -> &str {
            "null"
        }

        async fn get_image(&self, options: &SourceOptions) -> Result<SourceImage, SourceError> {
            Err(SourceError::NotFound {
                path: options.path.clone(),
            })
        }
    }

    fn route(name: &str, pattern: &str) -> Route {
        Route::new(
            name,
            pattern,
            Arc::new(NullSource),
            ImageProcessor::new(ProcessorConfig::default()),
            None,
        )
        .unwrap()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(vec![
            route("basic", "^/basic(?P<image_path>/.*)$"),
            route(
                "complex",
                r"^/complex(?P<image_path>/[\w\-]+)(\.(?P<width>\d+)x(?P<height>\d+))?(?P<image_ext>\.\w+)$",
            ),
            route("catchall", "^(?P<image_path>/.*)$"),
        ])
    }

    #[test]
    fn test_compile_pattern_requires_image_path() {
        assert!(compile_pattern("r", "^(?P<image_path>/.*)$").is_ok());
        assert!(matches!(
            compile_pattern("r", "^/(.*)$"),
            Err(ConfigError::MissingImagePathGroup { .. })
        ));
        assert!(matches!(
            compile_pattern("r", "^/(?P<image_path>.*$"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_basic_route() {
        let d = dispatcher();
        let dispatch = d.dispatch("/basic/image.jpg", "w=25&h=10").unwrap();
        assert_eq!(dispatch.route.name(), "basic");
        assert_eq!(dispatch.source_options.path, "/image.jpg");
        assert_eq!(dispatch.request.dimensions, Dimensions::new(25, 10));
    }

    #[test]
    fn test_complex_route_path_dimensions() {
        let d = dispatcher();

        let dispatch = d.dispatch("/complex/image.100x50.jpg", "").unwrap();
        assert_eq!(dispatch.route.name(), "complex");
        assert_eq!(dispatch.source_options.path, "/image.jpg");
        assert_eq!(dispatch.request.dimensions, Dimensions::new(100, 50));

        let dispatch = d.dispatch("/complex/image.jpg", "").unwrap();
        assert_eq!(dispatch.source_options.path, "/image.jpg");
        assert!(dispatch.request.dimensions.is_empty());
    }

    #[test]
    fn test_first_matching_route_wins() {
        let d = dispatcher();
        assert_eq!(d.dispatch("/basic/x.jpg", "").unwrap().route.name(), "basic");
        assert_eq!(d.dispatch("/other/x.jpg", "").unwrap().route.name(), "catchall");
    }

    #[test]
    fn test_no_match() {
        let d = Dispatcher::new(vec![route("basic", "^/basic(?P<image_path>/.*)$")]);
        assert!(d.dispatch("/nowhere.jpg", "").is_none());
        assert!(!d.routes()[0].matches("/nowhere.jpg"));
    }

    #[test]
    fn test_request_options_pass_through() {
        let d = dispatcher();
        let dispatch = d
            .dispatch("/basic/a.jpg", "focalpoint=0.1,0.9&scale_mode=aspect_fill&blur=0.4")
            .unwrap();
        assert_eq!(dispatch.request.focalpoint, Focalpoint::new(0.1, 0.9));
        assert_eq!(dispatch.request.scale_mode, Some(ScaleMode::AspectFill));
        assert_eq!(dispatch.request.blur_fraction, 0.4);
    }

    #[test]
    fn test_unknown_scale_mode_leaves_route_default() {
        let d = dispatcher();
        let dispatch = d.dispatch("/basic/a.jpg", "scale_mode=zoom").unwrap();
        assert_eq!(dispatch.request.scale_mode, None);
    }
}
