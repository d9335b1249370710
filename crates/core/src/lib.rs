pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod model_resolver;
    pub mod region;
    pub mod settings;
}

pub mod detection {
    pub mod domain {
        pub mod face_stages;
        pub mod landmark;
        pub mod landmark_detector;
        pub mod tracking_landmark_detector;
    }
    pub mod infrastructure;
}

pub mod preprocessing {
    pub mod preprocessor;
}

pub mod rendering {
    pub mod domain {
        pub mod draw_style;
        pub mod mesh_topology;
        pub mod overlay_renderer;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod display_sink;
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod ffmpeg_frame_source;
        pub mod image_sequence_sink;
        pub mod minifb_display_sink;
        pub mod synthetic_frame_source;
        pub mod threaded_frame_source;
    }
}

pub mod pipeline {
    pub mod frame_pipeline;
    pub mod pipeline_error;
    pub mod pipeline_logger;
    pub mod pipeline_state;
    pub mod shutdown;
}
