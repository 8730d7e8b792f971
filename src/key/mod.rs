pub(crate) mod chroma;
pub(crate) mod fit;
pub(crate) mod raster;
